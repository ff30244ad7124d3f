//! Tracking store abstractions.
//!
//! The store is the single source of truth for "have we seen this item
//! before". The core never caches its contents across batches; each run
//! reads fresh state, decides, and upserts.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ContentKind;

pub use local::LocalTrackingStore;
pub use memory::MemoryTrackingStore;

/// Persisted per-item tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedState {
    /// Content kind the item was first seen as
    pub kind: ContentKind,

    /// Last-known activity counter
    pub counter: u64,

    /// Set once on insert, preserved on update
    pub first_seen: DateTime<Utc>,

    /// Refreshed on every upsert
    pub last_checked: DateTime<Utc>,
}

/// Durable mapping from source identifier to tracking state.
///
/// Keyed uniquely by source_id. Insert sets `first_seen` once; update
/// preserves it and only refreshes `last_checked` and the counter.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Look up the state for a source id, None if never seen.
    async fn get(&self, source_id: &str) -> Result<Option<TrackedState>>;

    /// Insert or update the state for a source id, returning the state
    /// as persisted.
    async fn upsert(&self, source_id: &str, kind: ContentKind, counter: u64)
    -> Result<TrackedState>;
}

/// Apply upsert semantics to an optional existing state.
pub(crate) fn upserted(
    existing: Option<&TrackedState>,
    kind: ContentKind,
    counter: u64,
    now: DateTime<Utc>,
) -> TrackedState {
    match existing {
        Some(state) => TrackedState {
            kind: state.kind,
            // The counter never decreases
            counter: state.counter.max(counter),
            first_seen: state.first_seen,
            last_checked: now,
        },
        None => TrackedState {
            kind,
            counter,
            first_seen: now,
            last_checked: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upserted_insert_sets_first_seen() {
        let now = Utc::now();
        let state = upserted(None, ContentKind::Question, 3, now);
        assert_eq!(state.counter, 3);
        assert_eq!(state.first_seen, now);
        assert_eq!(state.last_checked, now);
    }

    #[test]
    fn test_upserted_update_preserves_first_seen_and_monotonic_counter() {
        let t0 = Utc::now();
        let initial = upserted(None, ContentKind::Question, 5, t0);

        let t1 = t0 + chrono::Duration::hours(1);
        let bumped = upserted(Some(&initial), ContentKind::Question, 8, t1);
        assert_eq!(bumped.counter, 8);
        assert_eq!(bumped.first_seen, t0);
        assert_eq!(bumped.last_checked, t1);

        // A lower incoming counter never decreases the stored one
        let t2 = t1 + chrono::Duration::hours(1);
        let held = upserted(Some(&bumped), ContentKind::Question, 2, t2);
        assert_eq!(held.counter, 8);
        assert_eq!(held.last_checked, t2);
    }
}
