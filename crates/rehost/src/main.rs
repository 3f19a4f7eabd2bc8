//! rehost CLI - localize images referenced in issue text.
//!
//! Provides commands for:
//! - `localize`: Download images referenced in a text body and rewrite it
//! - `sniff`: Report the detected image format of local files

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{LocalizeArgs, SniffArgs};
use output::{Output, Tone};

/// rehost - localize issue images.
#[derive(Parser)]
#[command(name = "rehost", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download referenced images and rewrite the text to use local copies.
    Localize(LocalizeArgs),
    /// Detect the image format of local files by content.
    Sniff(SniffArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Localize(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG (errors only when unset)
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
        Commands::Localize(args) => args.execute(),
        Commands::Sniff(args) => args.execute(),
    };

    if let Err(err) = result {
        output.status(Tone::Bad, &format!("Error: {err}"));
        std::process::exit(1);
    }
}
