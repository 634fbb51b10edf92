//! `tale scan` command implementation.

use std::path::PathBuf;

use clap::Args;
use tale_syntax::{DirectiveToken, TokenKind, normalize, parse_directive, scan};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the scan command.
#[derive(Args)]
pub(crate) struct ScanArgs {
    /// File to scan.
    file: PathBuf,

    /// Normalize indentation before scanning.
    #[arg(short, long)]
    normalize: bool,

    /// Print tokens as JSON.
    #[arg(long)]
    json: bool,
}

impl ScanArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let mut text = std::fs::read_to_string(&self.file)?;
        if self.normalize {
            text = normalize(&text);
        }

        let tokens: Vec<DirectiveToken<'_>> = scan(&text).collect();
        if self.json {
            output.result(&serde_json::to_string_pretty(&tokens)?);
            return Ok(());
        }
        for token in &tokens {
            output.result(&describe(token));
        }
        Ok(())
    }
}

/// One line per token: offset, kind, directive name if any, source text.
fn describe(token: &DirectiveToken<'_>) -> String {
    let kind = match token.kind {
        TokenKind::Text => "text",
        TokenKind::Leaf => "leaf",
        TokenKind::Container => "container",
    };
    let name = match token.kind {
        TokenKind::Text => String::new(),
        _ => parse_directive(token)
            .map(|header| header.name)
            .unwrap_or_default(),
    };
    format!("{:>6}  {kind:<9}  {name:<12}  {:?}", token.offset, token.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe_tokens() {
        let tokens: Vec<_> = scan("Gold: :show[gold]").collect();
        assert_eq!(
            describe(&tokens[0]),
            "     0  text                     \"Gold: \""
        );
        assert_eq!(
            describe(&tokens[1]),
            "     6  leaf       show          \":show[gold]\""
        );
    }
}
