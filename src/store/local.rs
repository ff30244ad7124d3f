//! Local filesystem tracking store.
//!
//! Persists the tracking table as a single JSON document with atomic
//! writes (write to temp, then rename). Suitable for the scheduled
//! single-process batch model; a relational store can implement the same
//! trait without touching the core.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ContentKind;
use crate::store::{TrackedState, TrackingStore, upserted};

const TRACKING_FILE: &str = "tracking.json";

/// JSON-file tracking store rooted at a directory.
pub struct LocalTrackingStore {
    root_dir: PathBuf,
    // Serializes read-modify-write cycles on the backing file
    write_lock: Mutex<()>,
}

impl LocalTrackingStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.root_dir.join(TRACKING_FILE)
    }

    async fn read_table(&self) -> Result<HashMap<String, TrackedState>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write the table atomically (temp file, then rename).
    async fn write_table(&self, table: &HashMap<String, TrackedState>) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for LocalTrackingStore {
    async fn get(&self, source_id: &str) -> Result<Option<TrackedState>> {
        let table = self.read_table().await?;
        Ok(table.get(source_id).cloned())
    }

    async fn upsert(
        &self,
        source_id: &str,
        kind: ContentKind,
        counter: u64,
    ) -> Result<TrackedState> {
        let _guard = self.write_lock.lock().await;

        let mut table = self.read_table().await?;
        let state = upserted(table.get(source_id), kind, counter, Utc::now());
        table.insert(source_id.to_string(), state.clone());

        self.write_table(&table)
            .await
            .map_err(|e| AppError::store(format!("upsert {source_id}: {e}")))?;
        Ok(state)
    }
}
