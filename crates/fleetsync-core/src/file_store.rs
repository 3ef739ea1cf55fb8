//! JSON snapshot store backing both device state and checkpoints.
//!
//! The whole snapshot is rewritten after every `set`: written to a sibling
//! temp file, then renamed over the target.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::checkpoint::{
    checkpoint_records, checkpoint_table, Checkpoint, CheckpointRecord, CheckpointStore,
    CheckpointTable,
};
use crate::state::{DeviceState, DeviceStateStore, StateKey, StateRecord, StateTable};
use crate::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    device_states: Vec<StateRecord>,
    #[serde(default)]
    checkpoints: Vec<CheckpointRecord>,
}

#[derive(Debug, Default)]
struct FileState {
    states: StateTable,
    checkpoints: CheckpointTable,
}

impl FileState {
    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            device_states: self.states.records(),
            checkpoints: checkpoint_records(&self.checkpoints),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            states: StateTable::from_records(snapshot.device_states),
            checkpoints: checkpoint_table(snapshot.checkpoints),
        }
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: Mutex<FileState>,
}

impl JsonFileStore {
    /// Opens the snapshot at `path`. A missing file starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => FileState::default(),
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                let mut state = FileState::from_snapshot(snapshot);
                state.states.clear_expired(OffsetDateTime::now_utc());
                state
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => FileState::default(),
            Err(error) => return Err(StoreError::Io(error)),
        };

        debug!(
            path = %path.display(),
            device_states = state.states.len(),
            checkpoints = state.checkpoints.len(),
            "opened state file"
        );

        Ok(Self {
            path,
            inner: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &FileState) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&state.to_snapshot())?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceStateStore for JsonFileStore {
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
        source_id: &str,
    ) -> Result<Option<DeviceState>, StoreError> {
        let key = StateKey::new(integration_id, action_id, source_id);
        Ok(self.inner.lock().await.states.get(&key, OffsetDateTime::now_utc()))
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
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        inner.states.put(key, state, ttl, now);
        inner.states.clear_expired(now);
        self.persist(&inner).await
    }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
    async fn get(
        &self,
        integration_id: &str,
        action_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let key = (integration_id.to_owned(), action_id.to_owned());
        Ok(self.inner.lock().await.checkpoints.get(&key).copied())
    }

    async fn set(
        &self,
        integration_id: &str,
        action_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let key = (integration_id.to_owned(), action_id.to_owned());
        let mut inner = self.inner.lock().await;
        inner.checkpoints.insert(key, checkpoint);
        self.persist(&inner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PULL_ACTION_ID;
    use tempfile::tempdir;
    use time::macros::datetime;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("state.json"))
            .await
            .expect("open");

        let state = DeviceStateStore::get(&store, "int-1", PULL_ACTION_ID, "sensor1")
            .await
            .expect("get");
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn state_and_checkpoint_survive_reload() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        let checkpoint = Checkpoint::new(datetime!(2025-06-27 01:56:02 UTC));

        {
            let store = JsonFileStore::open(&path).await.expect("open");
            DeviceStateStore::set(
                &store,
                "int-1",
                PULL_ACTION_ID,
                "sensor1",
                DeviceState::new("Moving"),
                None,
            )
            .await
            .expect("set state");
            CheckpointStore::set(&store, "int-1", PULL_ACTION_ID, checkpoint)
                .await
                .expect("set checkpoint");
        }

        let reopened = JsonFileStore::open(&path).await.expect("reopen");
        assert_eq!(
            DeviceStateStore::get(&reopened, "int-1", PULL_ACTION_ID, "sensor1")
                .await
                .expect("get state"),
            Some(DeviceState::new("Moving"))
        );
        assert_eq!(
            CheckpointStore::get(&reopened, "int-1", PULL_ACTION_ID)
                .await
                .expect("get checkpoint"),
            Some(checkpoint)
        );
    }

    #[tokio::test]
    async fn expired_entries_are_not_reloaded() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        {
            let store = JsonFileStore::open(&path).await.expect("open");
            DeviceStateStore::set(
                &store,
                "int-1",
                "quiet_period:off",
                "sensor1",
                DeviceState::new("Off").with_recorded_at("2023-01-01T10:00:00+00:00"),
                Some(Duration::ZERO),
            )
            .await
            .expect("set");
        }

        let reopened = JsonFileStore::open(&path).await.expect("reopen");
        assert!(
            DeviceStateStore::get(&reopened, "int-1", "quiet_period:off", "sensor1")
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").expect("write");

        let error = JsonFileStore::open(&path).await.expect_err("corrupt");
        assert!(matches!(error, StoreError::Serialization(_)));
    }
}
