//! Researcher CLI: multi-stage research assistant.
//!
//! Plans web-search queries for a question, searches them concurrently,
//! distills key findings, and writes an answer with numbered citations.

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
