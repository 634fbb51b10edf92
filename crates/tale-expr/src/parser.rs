//! Recursive-descent parser producing the expression tree.
//!
//! Precedence, lowest first: ternary `?:`, `??`, `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, postfix (member, index, call).

use serde_json::Value;

use crate::ExprError;
use crate::lexer::{Lexer, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parse expression source into a tree.
pub(crate) fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(source).tokenize()?;
    if tokens.first() == Some(&Token::Eof) {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_conditional()?;
    parser.expect(&Token::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ExprError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                found: self.peek().describe(),
                expected: what.to_owned(),
            })
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.parse_nullish()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_conditional()?;
        self.expect(&Token::Colon, "`:` in conditional expression")?;
        let alternate = self.parse_conditional()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    fn parse_nullish(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_or()?;
        while self.eat(&Token::Nullish) {
            let right = self.parse_or()?;
            left = Expr::Logical(LogicalOp::Nullish, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::LooseEq,
                Token::NotEq => BinaryOp::LooseNe,
                Token::EqEqEq => BinaryOp::StrictEq,
                Token::NotEqEq => BinaryOp::StrictNe,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(name) => expr = Expr::Member(Box::new(expr), name),
                        tok => {
                            return Err(ExprError::UnexpectedToken {
                                found: tok.describe(),
                                expected: "property name after `.`".to_owned(),
                            });
                        }
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_conditional()?;
                    self.expect(&Token::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::LParen => {
                    self.advance();
                    let args = self.parse_list(&Token::RParen, "`)`")?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parse comma-separated expressions up to `close` (consumed). Trailing comma allowed.
    fn parse_list(&mut self, close: &Token, what: &str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.parse_conditional()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, what)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(crate::number_value(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            }),
            Token::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::Array(self.parse_list(&Token::RBracket, "`]`")?)),
            Token::LBrace => self.parse_object(),
            Token::Eof => Err(ExprError::UnexpectedToken {
                found: Token::Eof.describe(),
                expected: "operand".to_owned(),
            }),
            tok => Err(ExprError::UnexpectedToken {
                found: tok.describe(),
                expected: "operand".to_owned(),
            }),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key = match self.advance() {
                Token::Ident(name) | Token::Str(name) => name,
                Token::Number(n) => crate::display_number(n),
                tok => {
                    return Err(ExprError::UnexpectedToken {
                        found: tok.describe(),
                        expected: "object key".to_owned(),
                    });
                }
            };
            self.expect(&Token::Colon, "`:` after object key")?;
            entries.push((key, self.parse_conditional()?));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace, "`}`")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_owned()))
    }

    fn num(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::from(n)))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                ident("a"),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2), num(3)))
            )
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, alternate) = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional(..)));
    }

    #[test]
    fn test_member_and_index() {
        let expr = parse("player.items[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index(
                Box::new(Expr::Member(ident("player"), "items".to_owned())),
                num(0)
            )
        );
    }

    #[test]
    fn test_object_literal() {
        let expr = parse("{hp: 1, 'name': 'x'}").unwrap();
        let Expr::Object(entries) = expr else {
            panic!("expected object");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, "name");
    }

    #[test]
    fn test_empty_is_error() {
        assert_eq!(parse("   "), Err(ExprError::Empty));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse("a b"),
            Err(ExprError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_missing_colon_in_ternary() {
        assert!(parse("a ? 1").is_err());
    }
}
