//! Swell CLI - Fleet disk audit and in-place volume expansion

use clap::Parser;
use swell_cli::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Diagnostic logging to stderr, enabled through `SWELL_LOG` (EnvFilter
/// syntax). Off by default so it never mixes into command output.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("SWELL_LOG"))
        .with_writer(std::io::stderr)
        .init();
}
