//! Tokenizer for the expression grammar.

use crate::ExprError;

/// Expression token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Nullish,
    Eof,
}

impl Token {
    /// Short human-readable description for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::Eof => "end of expression".to_owned(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::EqEqEq => "===",
            Self::NotEqEq => "!==",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Nullish => "??",
            Self::Number(_) | Self::Str(_) | Self::Ident(_) | Self::Eof => "",
        }
    }
}

pub(crate) struct Lexer<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub(crate) fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    /// Tokenize the whole source. The returned vector always ends with [`Token::Eof`].
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let eof = tok == Token::Eof;
            tokens.push(tok);
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consume `expected` if it is the next character.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }

        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '.' if matches!(self.peek(), Some(c) if c.is_ascii_digit()) => {
                return self.lex_number(start);
            }
            '.' => Token::Dot,
            '?' if self.eat('?') => Token::Nullish,
            '?' => Token::Question,
            '!' if self.eat('=') => {
                if self.eat('=') {
                    Token::NotEqEq
                } else {
                    Token::NotEq
                }
            }
            '!' => Token::Bang,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '=' if self.eat('=') => {
                if self.eat('=') {
                    Token::EqEqEq
                } else {
                    Token::EqEq
                }
            }
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            '"' | '\'' | '`' => return self.lex_string(ch, start),
            c if c.is_ascii_digit() => return self.lex_number(start),
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
                    self.advance();
                }
                Token::Ident(self.src[start..self.pos].to_owned())
            }
            other => {
                return Err(ExprError::UnexpectedChar {
                    ch: other,
                    offset: start,
                });
            }
        };
        Ok(token)
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, ExprError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        // Exponent part: 1e5, 2.5E-3
        if matches!(self.peek(), Some('e' | 'E'))
            && matches!(self.peek_second(), Some(c) if c.is_ascii_digit() || c == '-' || c == '+')
        {
            self.advance();
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExprError::InvalidNumber(text.to_owned()))
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<Token, ExprError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(ExprError::UnterminatedString(start)),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(ExprError::UnterminatedString(start)),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("a >= 1 && b !== 'x'"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Ge,
                Token::Number(1.0),
                Token::AndAnd,
                Token::Ident("b".to_owned()),
                Token::NotEqEq,
                Token::Str("x".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("2.5e2")[0], Token::Number(250.0));
        assert_eq!(lex(".5")[0], Token::Number(0.5));
    }

    #[test]
    fn test_member_dot_is_not_number() {
        assert_eq!(
            lex("a.b"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Dot,
                Token::Ident("b".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(lex(r#""a\"b""#)[0], Token::Str("a\"b".to_owned()));
        assert_eq!(lex("`tpl`")[0], Token::Str("tpl".to_owned()));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            Lexer::new("'abc").tokenize(),
            Err(ExprError::UnterminatedString(0))
        );
    }

    #[test]
    fn test_single_ampersand_rejected() {
        assert!(matches!(
            Lexer::new("a & b").tokenize(),
            Err(ExprError::UnexpectedChar { ch: '&', .. })
        ));
    }
}
