//! tale CLI - directive-driven narrative passages.
//!
//! Provides commands for:
//! - `render`: Render a passage to text, HTML or JSON
//! - `scan`: Dump the directive tokens of a file
//! - `normalize`: Print a file with directive indentation stripped

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{NormalizeArgs, RenderArgs, ScanArgs};
use output::Output;

/// tale - render Markdown passages with state, control flow and components.
#[derive(Parser)]
#[command(name = "tale", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a passage.
    Render(RenderArgs),
    /// Print the directive tokens of a file.
    Scan(ScanArgs),
    /// Print a file after indentation normalization.
    Normalize(NormalizeArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let verbose = matches!(&cli.command, Commands::Render(args) if args.verbose);
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Scan(args) => args.execute(),
        Commands::Normalize(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
