//! One incremental pull: window, fetch, convert, filter, emit, checkpoint.

use std::sync::Arc;

use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::{Credentials, Integration, PullConfig};
use crate::convert::{convert_all, ConvertOptions};
use crate::dedup::{DedupConfig, DeduplicationFilter};
use crate::domain::timestamp::{format_iso, format_wire};
use crate::domain::PollWindow;
use crate::sink::{batches, ObservationSink, BATCH_SIZE};
use crate::state::{DeviceStateStore, PULL_ACTION_ID};
use crate::vendor::VendorClient;
use crate::{PollError, ValidationError, VendorError};

/// Counters of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub window: PollWindow,
    pub records_received: usize,
    pub observations_converted: usize,
    pub observations_forwarded: usize,
    /// Items accepted by the sink, summed over batches.
    pub observations_extracted: usize,
    pub batches_sent: usize,
    /// Checkpoint in effect after the cycle.
    pub checkpoint: Option<OffsetDateTime>,
}

impl CycleReport {
    pub fn to_json(&self) -> Value {
        json!({
            "observations_extracted": self.observations_extracted,
            "records_received": self.records_received,
            "observations_converted": self.observations_converted,
            "observations_forwarded": self.observations_forwarded,
            "batches_sent": self.batches_sent,
            "window_start": format_iso(self.window.start),
            "window_end": format_iso(self.window.end),
            "checkpoint": self.checkpoint.map(format_wire),
        })
    }
}

pub struct PollCycle {
    integration: Integration,
    credentials: Credentials,
    pull_config: PullConfig,
    vendor: VendorClient,
    state_store: Arc<dyn DeviceStateStore>,
    dedup: DeduplicationFilter,
    checkpoints: Arc<dyn CheckpointStore>,
    sink: Arc<dyn ObservationSink>,
    batch_size: usize,
    convert_options: ConvertOptions,
    cycle_guard: Mutex<()>,
}

impl PollCycle {
    /// The vendor client is switched to the schema named by `pull_config`
    /// so request and decoding always agree.
    pub fn new(
        integration: Integration,
        credentials: Credentials,
        pull_config: PullConfig,
        vendor: VendorClient,
        state_store: Arc<dyn DeviceStateStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        sink: Arc<dyn ObservationSink>,
    ) -> Self {
        let dedup = DeduplicationFilter::new(state_store.clone(), integration.id.clone());
        Self {
            vendor: vendor.with_schema(pull_config.schema()),
            integration,
            credentials,
            pull_config,
            state_store,
            dedup,
            checkpoints,
            sink,
            batch_size: BATCH_SIZE,
            convert_options: ConvertOptions::default(),
            cycle_guard: Mutex::new(()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ValidationError> {
        if batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize);
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_dedup_config(mut self, config: DedupConfig) -> Self {
        self.dedup = DeduplicationFilter::with_config(
            self.state_store.clone(),
            self.integration.id.clone(),
            config,
        );
        self
    }

    pub fn with_convert_options(mut self, options: ConvertOptions) -> Self {
        self.convert_options = options;
        self
    }

    pub fn integration(&self) -> &Integration {
        &self.integration
    }

    pub async fn run_now(&self) -> Result<CycleReport, PollError> {
        self.run(OffsetDateTime::now_utc()).await
    }

    /// Runs one cycle as of `now`. Overlapping calls on the same instance
    /// wait for each other.
    ///
    /// The checkpoint only moves after every batch was accepted, and only to
    /// the vendor's `MaxGmtUpdateTime`. Device state is recorded per accepted
    /// batch.
    #[instrument(skip(self, now), fields(integration_id = %self.integration.id))]
    pub async fn run(&self, now: OffsetDateTime) -> Result<CycleReport, PollError> {
        let _cycle = self.cycle_guard.lock().await;

        let offset = self.pull_config.utc_offset()?;
        let previous = self
            .checkpoints
            .get(&self.integration.id, PULL_ACTION_ID)
            .await?
            .map(|checkpoint| checkpoint.last_updated_time);
        let window = PollWindow::compute(
            previous,
            self.pull_config.look_back_window_hours(),
            now,
        );
        info!(
            window = %window,
            resumed = previous.is_some(),
            username = self.credentials.username(),
            "pulling observations"
        );

        let fetched = self.vendor.fetch(&window, &self.credentials).await?;
        let records_received = fetched.records.len();

        let observations = convert_all(
            &fetched.records,
            self.vendor.schema(),
            offset,
            self.convert_options,
        )?;
        let observations_converted = observations.len();

        let plan = self.dedup.plan(observations).await?;
        let observations_forwarded = plan.len();

        // Device state follows delivery: a failed batch leaves its
        // observations undecided for the retry of this window.
        let mut observations_extracted = 0;
        let mut batches_sent = 0;
        let mut delivered = 0;
        for (index, batch) in batches(plan.forwarded(), self.batch_size).enumerate() {
            info!(batch = index, size = batch.len(), "sending observations batch");
            let accepted = self.sink.send(batch).await?;
            self.dedup
                .commit_batch(&plan, delivered..delivered + batch.len())
                .await?;
            delivered += batch.len();
            observations_extracted += accepted.len();
            batches_sent += 1;
        }
        self.dedup.commit_trailing(&plan).await?;

        let checkpoint = match fetched.max_gmt_update_time {
            Some(max_gmt_update_time) => {
                self.checkpoints
                    .set(
                        &self.integration.id,
                        PULL_ACTION_ID,
                        Checkpoint::new(max_gmt_update_time),
                    )
                    .await?;
                Some(max_gmt_update_time)
            }
            None => {
                if records_received > 0 {
                    warn!("vendor sent records without MaxGmtUpdateTime, checkpoint unchanged");
                }
                previous
            }
        };

        if observations_forwarded == 0 {
            info!(records_received, "no new observations to send");
        }
        info!(
            records_received,
            observations_converted,
            observations_forwarded,
            observations_extracted,
            batches_sent,
            checkpoint = ?checkpoint.map(format_wire),
            "pull cycle finished"
        );

        Ok(CycleReport {
            window,
            records_received,
            observations_converted,
            observations_forwarded,
            observations_extracted,
            batches_sent,
            checkpoint,
        })
    }
}

/// Outcome of a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    Invalid { message: String, code: i64 },
    TransportFailure { status_code: Option<u16> },
}

impl CredentialStatus {
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn as_json(&self) -> Value {
        match self {
            Self::Valid => json!({ "valid_credentials": true }),
            Self::Invalid { message, code } => json!({
                "valid_credentials": false,
                "message": message,
                "code": code,
            }),
            Self::TransportFailure { status_code } => json!({
                "error": true,
                "status_code": status_code,
            }),
        }
    }
}

impl From<VendorError> for CredentialStatus {
    fn from(error: VendorError) -> Self {
        match error {
            VendorError::AuthInvalid { code, message }
            | VendorError::RateLimited { code, message }
            | VendorError::General { code, message } => Self::Invalid { message, code },
            VendorError::Transport { status, .. } => Self::TransportFailure {
                status_code: status,
            },
            VendorError::Envelope(_) => Self::TransportFailure { status_code: None },
        }
    }
}

/// Performs one look-back fetch with `credentials` and classifies the
/// outcome. A successful call with an empty data set counts as valid.
#[instrument(skip_all, fields(username = credentials.username()))]
pub async fn verify_credentials(
    vendor: &VendorClient,
    credentials: &Credentials,
    pull_config: &PullConfig,
    now: OffsetDateTime,
) -> CredentialStatus {
    let window = PollWindow::compute(None, pull_config.look_back_window_hours(), now);
    match vendor.fetch(&window, credentials).await {
        Ok(fetched) => {
            info!(records = fetched.records.len(), "credentials accepted by vendor");
            CredentialStatus::Valid
        }
        Err(error) => {
            warn!(error = %error, "credential check failed");
            CredentialStatus::from(error)
        }
    }
}
