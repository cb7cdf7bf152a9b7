//! repodocs CLI — AI documentation generation for remote repositories.
//!
//! Turns a GitHub repository into a structured documentation document,
//! one-shot from the terminal or as a long-running HTTP service.

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
