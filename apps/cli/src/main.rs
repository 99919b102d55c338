//! newssync CLI — incremental feed synchronization for paginated news
//! sources.
//!
//! Scans each configured source backwards until it finds the most recent
//! item already stored, then persists everything published since.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
