//! llmdocs CLI: builds a validated, LLM-assembled language reference from
//! upstream documentation.

mod commands;
mod sinks;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    let code = commands::run(cli).await?;
    std::process::exit(code)
}
