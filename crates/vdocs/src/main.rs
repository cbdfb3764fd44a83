//! vdocs CLI - multi-tenant documentation engine.
//!
//! Provides commands for:
//! - `serve`: Start the resolution API server
//! - `check`: Validate configuration and registry, list tenant versions

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, ServeArgs};
use error::CliError;
use output::Output;

/// vdocs - multi-tenant, versioned documentation engine.
#[derive(Parser)]
#[command(name = "vdocs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the resolution API server.
    Serve(ServeArgs),
    /// Validate configuration and registry descriptor.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => tokio::runtime::Runtime::new()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(args.execute())),
        Commands::Check(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        #[allow(clippy::exit)]
        std::process::exit(1);
    }
}
