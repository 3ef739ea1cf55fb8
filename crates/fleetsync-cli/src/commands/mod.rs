mod auth;
mod pull;

use std::process::ExitCode;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::config::ServiceConfig;
use crate::error::CliError;

/// JSON result of a command plus the exit code it implies.
pub struct CommandResult {
    pub data: Value,
    pub exit_code: ExitCode,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            exit_code: ExitCode::SUCCESS,
        }
    }

    pub fn with_exit_code(mut self, code: u8) -> Self {
        self.exit_code = ExitCode::from(code);
        self
    }
}

pub async fn run(cli: &Cli, config: ServiceConfig) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Pull(args) => pull::run(args, config).await,
        Command::Auth(args) => auth::run(args, config).await,
    }
}
