//! Per-device state storage.
//!
//! Entries are keyed by `(integration_id, action_id, source_id)` so several
//! integrations can share one store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::StoreError;

/// Action id of the primary per-device status entries.
pub const PULL_ACTION_ID: &str = "pull_observations";

/// Last known state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl DeviceState {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            recorded_at: None,
        }
    }

    pub fn with_recorded_at(mut self, recorded_at: impl Into<String>) -> Self {
        self.recorded_at = Some(recorded_at.into());
        self
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    /// Returns `None` for unknown or expired entries.
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
        source_id: &str,
    ) -> Result<Option<DeviceState>, StoreError>;

    /// Overwrites the entry. `ttl = None` keeps it indefinitely.
    async fn set(
        &self,
        integration_id: &str,
        action_id: &str,
        source_id: &str,
        state: DeviceState,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct StateKey {
    pub integration_id: String,
    pub action_id: String,
    pub source_id: String,
}

impl StateKey {
    pub fn new(integration_id: &str, action_id: &str, source_id: &str) -> Self {
        Self {
            integration_id: integration_id.to_owned(),
            action_id: action_id.to_owned(),
            source_id: source_id.to_owned(),
        }
    }
}

/// Persisted form of one entry, shared with the file-backed store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StateRecord {
    #[serde(flatten)]
    pub key: StateKey,
    pub state: DeviceState,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
struct StateEntry {
    state: DeviceState,
    expires_at: Option<OffsetDateTime>,
}

impl StateEntry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// TTL-aware table behind both store implementations.
#[derive(Debug, Default)]
pub(crate) struct StateTable {
    map: HashMap<StateKey, StateEntry>,
}

impl StateTable {
    pub fn get(&self, key: &StateKey, now: OffsetDateTime) -> Option<DeviceState> {
        self.map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.state.clone())
    }

    pub fn put(
        &mut self,
        key: StateKey,
        state: DeviceState,
        ttl: Option<Duration>,
        now: OffsetDateTime,
    ) {
        let expires_at = ttl.and_then(|ttl| {
            time::Duration::try_from(ttl)
                .ok()
                .and_then(|ttl| now.checked_add(ttl))
        });
        self.map.insert(key, StateEntry { state, expires_at });
    }

    pub fn clear_expired(&mut self, now: OffsetDateTime) {
        self.map.retain(|_, entry| entry.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn records(&self) -> Vec<StateRecord> {
        self.map
            .iter()
            .map(|(key, entry)| StateRecord {
                key: key.clone(),
                state: entry.state.clone(),
                expires_at: entry.expires_at,
            })
            .collect()
    }

    pub fn from_records(records: Vec<StateRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| {
                (
                    record.key,
                    StateEntry {
                        state: record.state,
                        expires_at: record.expires_at,
                    },
                )
            })
            .collect();
        Self { map }
    }
}

/// Thread-safe in-memory device-state store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<tokio::sync::RwLock<StateTable>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included until `clear_expired` runs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear_expired(&self) {
        self.inner
            .write()
            .await
            .clear_expired(OffsetDateTime::now_utc());
    }
}

#[async_trait]
impl DeviceStateStore for InMemoryStateStore {
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
        source_id: &str,
    ) -> Result<Option<DeviceState>, StoreError> {
        let key = StateKey::new(integration_id, action_id, source_id);
        Ok(self.inner.read().await.get(&key, OffsetDateTime::now_utc()))
    }

    async fn set(
        &self,
        integration_id: &str,
        action_id: &str,
        source_id: &str,
        state: DeviceState,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let key = StateKey::new(integration_id, action_id, source_id);
        self.inner
            .write()
            .await
            .put(key, state, ttl, OffsetDateTime::now_utc());
        Ok(())
    }
}
