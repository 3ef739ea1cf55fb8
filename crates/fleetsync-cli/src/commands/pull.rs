use std::sync::Arc;

use fleetsync_core::{
    CheckpointStore, ConvertOptions, DeviceStateStore, HttpAuth, HttpSink,
    InMemoryCheckpointStore, InMemoryStateStore, JsonFileStore, JsonLinesSink, ObservationSink,
    PollCycle, PullConfig, ReqwestHttpClient, RetryConfig, VendorClient,
};
use tracing::info;

use crate::cli::PullArgs;
use crate::commands::CommandResult;
use crate::config::ServiceConfig;
use crate::error::CliError;

pub async fn run(args: &PullArgs, config: ServiceConfig) -> Result<CommandResult, CliError> {
    let integration = config.integration()?;
    let credentials = config.credentials()?;
    let pull_config = match args.look_back_hours {
        Some(hours) => PullConfig::new(hours, config.gmt_offset)?.with_schema(config.schema),
        None => config.pull_config()?,
    };

    let http_client = Arc::new(ReqwestHttpClient::new());
    let vendor = VendorClient::new(http_client.clone(), integration.endpoint()).with_retry(
        RetryConfig {
            max_attempts: config.max_attempts.max(1),
            ..RetryConfig::default()
        },
    );

    let (state_store, checkpoints) = open_stores(args, &config).await?;
    let sink = build_sink(args, &config, http_client);

    let cycle = PollCycle::new(
        integration,
        credentials,
        pull_config,
        vendor,
        state_store,
        checkpoints,
        sink,
    )
    .with_batch_size(args.batch_size.unwrap_or(config.batch_size))?
    .with_dedup_config(config.dedup_config())
    .with_convert_options(ConvertOptions {
        moving_only: config.moving_only,
    });

    let report = cycle.run_now().await?;
    Ok(CommandResult::ok(report.to_json()))
}

async fn open_stores(
    args: &PullArgs,
    config: &ServiceConfig,
) -> Result<(Arc<dyn DeviceStateStore>, Arc<dyn CheckpointStore>), CliError> {
    match args.state_file.as_ref().or(config.state_file.as_ref()) {
        Some(path) => {
            let store = Arc::new(JsonFileStore::open(path.clone()).await?);
            info!(path = %store.path().display(), "using state file");
            let state_store: Arc<dyn DeviceStateStore> = store.clone();
            let checkpoints: Arc<dyn CheckpointStore> = store;
            Ok((state_store, checkpoints))
        }
        None => {
            info!("no state file configured, device state lasts for this run only");
            let state_store: Arc<dyn DeviceStateStore> = Arc::new(InMemoryStateStore::new());
            let checkpoints: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
            Ok((state_store, checkpoints))
        }
    }
}

fn build_sink(
    args: &PullArgs,
    config: &ServiceConfig,
    http_client: Arc<ReqwestHttpClient>,
) -> Arc<dyn ObservationSink> {
    let url = args.sink_url.as_ref().or(config.sink_url.as_ref());
    match url {
        Some(url) if !args.dry_run => {
            let auth = config
                .sink_token
                .clone()
                .map_or(HttpAuth::None, HttpAuth::BearerToken);
            Arc::new(HttpSink::new(http_client, url.clone()).with_auth(auth))
        }
        _ => Arc::new(JsonLinesSink::new(std::io::stdout())),
    }
}
