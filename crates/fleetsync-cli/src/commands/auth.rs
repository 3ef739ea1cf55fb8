use std::sync::Arc;

use fleetsync_core::{
    verify_credentials, CredentialStatus, PullConfig, ReqwestHttpClient, RetryConfig,
    VendorClient,
};
use time::OffsetDateTime;

use crate::cli::AuthArgs;
use crate::commands::CommandResult;
use crate::config::ServiceConfig;
use crate::error::CliError;

pub async fn run(args: &AuthArgs, config: ServiceConfig) -> Result<CommandResult, CliError> {
    let integration = config.integration()?;
    let credentials = config.credentials()?;
    let pull_config = match args.look_back_hours {
        Some(hours) => PullConfig::new(hours, config.gmt_offset)?.with_schema(config.schema),
        None => config.pull_config()?,
    };

    let vendor = VendorClient::new(Arc::new(ReqwestHttpClient::new()), integration.endpoint())
        .with_schema(pull_config.schema())
        .with_retry(RetryConfig {
            max_attempts: config.max_attempts.max(1),
            ..RetryConfig::default()
        });

    let status =
        verify_credentials(&vendor, &credentials, &pull_config, OffsetDateTime::now_utc()).await;

    let result = CommandResult::ok(status.as_json());
    Ok(match status {
        CredentialStatus::Valid => result,
        CredentialStatus::Invalid { .. } => result.with_exit_code(3),
        CredentialStatus::TransportFailure { .. } => result.with_exit_code(4),
    })
}
