mod cli;
mod commands;
mod config;
mod error;
mod telemetry;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::config::ServiceConfig;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(cli.config.as_deref())?;
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    telemetry::init_telemetry(&log_level, cli.log_json || config.log_json)?;

    let result = commands::run(&cli, config).await?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&result.data)?
    } else {
        serde_json::to_string(&result.data)?
    };
    println!("{rendered}");

    Ok(result.exit_code)
}
