mod bootstrap;
mod cli_args;
mod redacted;
mod startup;

use anyhow::Result;
use clap::Parser;

use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = bootstrap::load_dotenv();
    bootstrap::init_tracing();
    bootstrap::report_dotenv(dotenv);

    let cli = Cli::parse();
    startup::run(cli).await
}
