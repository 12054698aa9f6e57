//! omeka-harvest CLI: fetch, filter and sort items from an Omeka Classic site.
//!
//! Results are printed to stdout as text or JSON; logs go to stderr.

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
