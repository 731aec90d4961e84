//! calassist server entry point.

use std::process::ExitCode;

use clap::Parser;

use calassist_core::init_tracing;
use calassist_server::{Cli, ServerConfig, ServerResult, serve};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    init_tracing(cli.tracing_config()?)?;

    let mut config = match cli.config {
        Some(ref path) => ServerConfig::load_from(path)?,
        None => ServerConfig::load_default()?,
    };
    config.apply(cli.overrides());

    serve(config.resolve()?).await
}
