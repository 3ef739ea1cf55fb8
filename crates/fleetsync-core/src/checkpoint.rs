//! Resumption anchor of the pull action.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::StoreError;

/// Maximum vendor update time already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated_time: OffsetDateTime,
}

impl Checkpoint {
    pub fn new(last_updated_time: OffsetDateTime) -> Self {
        Self { last_updated_time }
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError>;

    async fn set(
        &self,
        integration_id: &str,
        action_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError>;
}

/// Persisted form of one checkpoint, shared with the file-backed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CheckpointRecord {
    pub integration_id: String,
    pub action_id: String,
    pub checkpoint: Checkpoint,
}

pub(crate) type CheckpointTable = HashMap<(String, String), Checkpoint>;

pub(crate) fn checkpoint_records(table: &CheckpointTable) -> Vec<CheckpointRecord> {
    table
        .iter()
        .map(|((integration_id, action_id), checkpoint)| CheckpointRecord {
            integration_id: integration_id.clone(),
            action_id: action_id.clone(),
            checkpoint: *checkpoint,
        })
        .collect()
}

pub(crate) fn checkpoint_table(records: Vec<CheckpointRecord>) -> CheckpointTable {
    records
        .into_iter()
        .map(|record| ((record.integration_id, record.action_id), record.checkpoint))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    inner: Arc<tokio::sync::RwLock<CheckpointTable>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let key = (integration_id.to_owned(), action_id.to_owned());
        Ok(self.inner.read().await.get(&key).copied())
    }

    async fn set(
        &self,
        integration_id: &str,
        action_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let key = (integration_id.to_owned(), action_id.to_owned());
        self.inner.write().await.insert(key, checkpoint);
        Ok(())
    }
}
