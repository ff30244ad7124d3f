//! In-memory tracking store for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::ContentKind;
use crate::store::{TrackedState, TrackingStore, upserted};

/// Tracking store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryTrackingStore {
    table: Mutex<HashMap<String, TrackedState>>,
}

impl MemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TrackingStore for MemoryTrackingStore {
    async fn get(&self, source_id: &str) -> Result<Option<TrackedState>> {
        let table = self
            .table
            .lock()
            .map_err(|_| AppError::store("tracking table lock poisoned"))?;
        Ok(table.get(source_id).cloned())
    }

    async fn upsert(
        &self,
        source_id: &str,
        kind: ContentKind,
        counter: u64,
    ) -> Result<TrackedState> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| AppError::store("tracking table lock poisoned"))?;
        let state = upserted(table.get(source_id), kind, counter, Utc::now());
        table.insert(source_id.to_string(), state.clone());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let store = MemoryTrackingStore::new();
        assert!(store.is_empty());

        store.upsert("a", ContentKind::Question, 5).await.unwrap();
        let state = store.get("a").await.unwrap().unwrap();
        assert_eq!(state.counter, 5);
        assert_eq!(store.len(), 1);
    }
}
