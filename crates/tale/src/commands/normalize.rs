//! `tale normalize` command implementation.

use std::path::PathBuf;

use clap::Args;
use tale_syntax::normalize;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the normalize command.
#[derive(Args)]
pub(crate) struct NormalizeArgs {
    /// File to normalize.
    file: PathBuf,

    /// Write the result back to the file instead of stdout.
    #[arg(short, long)]
    in_place: bool,
}

impl NormalizeArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let text = std::fs::read_to_string(&self.file)?;
        let normalized = normalize(&text);
        if self.in_place {
            if normalized != text {
                std::fs::write(&self.file, normalized)?;
            }
        } else {
            Output::new().result(normalized.trim_end_matches('\n'));
        }
        Ok(())
    }
}
