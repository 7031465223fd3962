//! CLI entry point, the composition root for `streamflow`.

use std::process::ExitCode;

use clap::Parser;

use streamflow_cli::error::exit_code_for;
use streamflow_cli::{Cli, Commands, handlers, logging};

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(&args).await,
        Commands::Plan(args) => Ok(handlers::plan::execute(&args)?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so clap sees STREAMFLOW_* from it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(u8::try_from(exit_code_for(&err)).unwrap_or(1))
        }
    }
}
