mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Run(args) => cli::run(args).await?,
        Commands::Check { directives } => {
            rucase::logger::init_logger(false);
            cli::check(&directives)
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
