//! Per-device forward/suppress state machine.
//!
//! | Stored status | Incoming | Outcome | Write |
//! |---------------|----------|---------|-------|
//! | none | any | forward | primary `{status}` |
//! | `a` | `b != a` | forward | primary `{status}` |
//! | `a` (quiet) | `a` | forward iff `recorded_at` changed | quiet entry, TTL |
//! | `a` | `a` | suppress | nothing |
//!
//! A quiet-status observation forwarded through the first two rows also
//! seeds its quiet entry.
//!
//! [`DeduplicationFilter::plan`] decides a page without touching the store.
//! The writes are committed per delivered batch, so observations that never
//! reached the sink are decided afresh on the next cycle.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::domain::Observation;
use crate::state::{DeviceState, DeviceStateStore, PULL_ACTION_ID};
use crate::StoreError;

pub const QUIET_PERIOD_TTL: Duration = Duration::from_secs(600);

const QUIET_ACTION_PREFIX: &str = "quiet_period:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardReason {
    FirstSeen,
    StatusChanged,
    QuietPeriodNewTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    StatusUnchanged,
    QuietPeriodDuplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward(ForwardReason),
    Suppress(SuppressReason),
}

impl Decision {
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Forward(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// Statuses, compared case-insensitively, that re-forward on a new
    /// `recorded_at` while unchanged.
    pub quiet_statuses: Vec<String>,
    pub quiet_period: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            quiet_statuses: vec![String::from("off")],
            quiet_period: QUIET_PERIOD_TTL,
        }
    }
}

impl DedupConfig {
    pub fn is_quiet(&self, status: &str) -> bool {
        self.quiet_statuses
            .iter()
            .any(|quiet| quiet.eq_ignore_ascii_case(status))
    }
}

/// Action id of the secondary entry for a quiet status.
pub fn quiet_action_id(status: &str) -> String {
    format!("{QUIET_ACTION_PREFIX}{}", status.to_lowercase())
}

/// A device-state write implied by a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateWrite {
    pub action_id: String,
    pub source_id: String,
    pub state: DeviceState,
    pub ttl: Option<Duration>,
}

type Slot = (String, String);

impl StateWrite {
    fn slot(&self) -> Slot {
        (self.action_id.clone(), self.source_id.clone())
    }
}

/// Forwarded observations of one page, each paired with the writes that
/// record it once delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupPlan {
    forwarded: Vec<Observation>,
    writes: Vec<Vec<StateWrite>>,
    /// Quiet refreshes of suppressed observations after the last forward.
    trailing: Vec<StateWrite>,
}

impl DedupPlan {
    pub fn forwarded(&self) -> &[Observation] {
        &self.forwarded
    }

    pub fn len(&self) -> usize {
        self.forwarded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwarded.is_empty()
    }

    /// Writes owed by `forwarded()[range]`, in decision order.
    pub fn writes_for(&self, range: Range<usize>) -> impl Iterator<Item = &StateWrite> {
        self.writes
            .get(range)
            .unwrap_or_default()
            .iter()
            .flatten()
    }

    pub fn trailing_writes(&self) -> &[StateWrite] {
        &self.trailing
    }

    pub fn into_forwarded(self) -> Vec<Observation> {
        self.forwarded
    }
}

pub struct DeduplicationFilter {
    store: Arc<dyn DeviceStateStore>,
    integration_id: String,
    config: DedupConfig,
    guard: Mutex<()>,
}

impl DeduplicationFilter {
    pub fn new(store: Arc<dyn DeviceStateStore>, integration_id: impl Into<String>) -> Self {
        Self::with_config(store, integration_id, DedupConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DeviceStateStore>,
        integration_id: impl Into<String>,
        config: DedupConfig,
    ) -> Self {
        Self {
            store,
            integration_id: integration_id.into(),
            config,
            guard: Mutex::new(()),
        }
    }

    /// Decides one observation and records the state it implies.
    ///
    /// Store failures propagate; nothing is written on a failed read.
    pub async fn evaluate(&self, observation: &Observation) -> Result<Decision, StoreError> {
        let _serialized = self.guard.lock().await;
        let (decision, writes) = self.decide(observation, &HashMap::new()).await?;
        self.apply(writes.iter()).await?;
        Ok(decision)
    }

    /// Decides a page in input order without writing. Later observations of
    /// the same device see the writes owed by earlier ones.
    #[instrument(skip(self, observations), fields(integration_id = %self.integration_id, input = observations.len()))]
    pub async fn plan(&self, observations: Vec<Observation>) -> Result<DedupPlan, StoreError> {
        let _serialized = self.guard.lock().await;
        let mut pending = HashMap::new();
        let mut plan = DedupPlan::default();
        let mut owed = Vec::new();

        for observation in observations {
            let (decision, writes) = self.decide(&observation, &pending).await?;
            for write in &writes {
                pending.insert(write.slot(), write.state.clone());
            }
            owed.extend(writes);
            if decision.is_forward() {
                plan.forwarded.push(observation);
                plan.writes.push(std::mem::take(&mut owed));
            }
        }
        plan.trailing = owed;

        debug!(forwarded = plan.len(), "deduplication planned");
        Ok(plan)
    }

    /// Records the observations at `delivered` as sent.
    pub async fn commit_batch(
        &self,
        plan: &DedupPlan,
        delivered: Range<usize>,
    ) -> Result<(), StoreError> {
        let _serialized = self.guard.lock().await;
        self.apply(plan.writes_for(delivered)).await
    }

    /// Applies the quiet refreshes that follow the last forwarded observation.
    pub async fn commit_trailing(&self, plan: &DedupPlan) -> Result<(), StoreError> {
        let _serialized = self.guard.lock().await;
        self.apply(plan.trailing_writes().iter()).await
    }

    /// Plans and commits in one step, keeping only forwarded observations.
    pub async fn filter(
        &self,
        observations: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError> {
        let plan = self.plan(observations).await?;
        self.commit_batch(&plan, 0..plan.len()).await?;
        self.commit_trailing(&plan).await?;
        Ok(plan.into_forwarded())
    }

    async fn lookup(
        &self,
        pending: &HashMap<Slot, DeviceState>,
        action_id: &str,
        source: &str,
    ) -> Result<Option<DeviceState>, StoreError> {
        if let Some(state) = pending.get(&(action_id.to_owned(), source.to_owned())) {
            return Ok(Some(state.clone()));
        }
        self.store.get(&self.integration_id, action_id, source).await
    }

    async fn decide(
        &self,
        observation: &Observation,
        pending: &HashMap<Slot, DeviceState>,
    ) -> Result<(Decision, Vec<StateWrite>), StoreError> {
        let source = observation.source.as_str();
        let status = observation.status();
        let stored = self.lookup(pending, PULL_ACTION_ID, source).await?;

        let reason = match stored {
            None => ForwardReason::FirstSeen,
            Some(previous) if previous.status != status => ForwardReason::StatusChanged,
            Some(_) if self.config.is_quiet(status) => {
                return self.decide_quiet(observation, pending).await;
            }
            Some(_) => {
                let reason = SuppressReason::StatusUnchanged;
                debug!(source, status, ?reason, "suppressing observation");
                return Ok((Decision::Suppress(reason), Vec::new()));
            }
        };

        let mut writes = vec![StateWrite {
            action_id: String::from(PULL_ACTION_ID),
            source_id: source.to_owned(),
            state: DeviceState::new(status),
            ttl: None,
        }];
        if self.config.is_quiet(status) {
            writes.push(self.quiet_entry(observation));
        }
        debug!(source, status, ?reason, "forwarding observation");
        Ok((Decision::Forward(reason), writes))
    }

    async fn decide_quiet(
        &self,
        observation: &Observation,
        pending: &HashMap<Slot, DeviceState>,
    ) -> Result<(Decision, Vec<StateWrite>), StoreError> {
        let source = observation.source.as_str();
        let status = observation.status();
        let recorded_at = observation.recorded_at_iso();

        let previous = self
            .lookup(pending, &quiet_action_id(status), source)
            .await?;

        let decision = match previous.and_then(|state| state.recorded_at) {
            Some(seen) if seen == recorded_at => {
                Decision::Suppress(SuppressReason::QuietPeriodDuplicate)
            }
            _ => Decision::Forward(ForwardReason::QuietPeriodNewTimestamp),
        };

        debug!(source, status, %recorded_at, ?decision, "quiet status evaluated");
        Ok((decision, vec![self.quiet_entry(observation)]))
    }

    fn quiet_entry(&self, observation: &Observation) -> StateWrite {
        let status = observation.status();
        StateWrite {
            action_id: quiet_action_id(status),
            source_id: observation.source.clone(),
            state: DeviceState::new(status).with_recorded_at(observation.recorded_at_iso()),
            ttl: Some(self.config.quiet_period),
        }
    }

    async fn apply(&self, writes: impl Iterator<Item = &StateWrite>) -> Result<(), StoreError> {
        for write in writes {
            self.store
                .set(
                    &self.integration_id,
                    &write.action_id,
                    &write.source_id,
                    write.state.clone(),
                    write.ttl,
                )
                .await?;
        }
        Ok(())
    }
}
