// src/pipeline/detect.rs

//! Incremental change detection.
//!
//! Partitions an incoming batch into new, updated, and unchanged items
//! against the tracking store, with flood control on the very first run.
//! Decisions are made against store state as it was at batch start; the
//! only intra-batch coupling is the first-run acceptance counter, so the
//! per-item loop must stay sequential.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ContentItem;
use crate::store::{TrackedState, TrackingStore};

/// Why an item was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Change {
    /// Never seen before
    New { count: u64 },
    /// Seen before with a lower activity counter
    Updated { previous: u64, delta: u64 },
}

impl Change {
    pub fn previous_count(&self) -> u64 {
        match self {
            Change::New { .. } => 0,
            Change::Updated { previous, .. } => *previous,
        }
    }

    pub fn delta(&self) -> u64 {
        match self {
            Change::New { count } => *count,
            Change::Updated { delta, .. } => *delta,
        }
    }
}

/// One emitted item with its change classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub item: ContentItem,
    pub change: Change,
    /// Tracking state as persisted by this batch's upsert
    pub state: TrackedState,
}

/// Detector for one pre-partitioned batch of a single content kind.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    /// Cap on emitted new items when the batch is the first run ever
    first_run_limit: usize,
}

impl ChangeDetector {
    pub fn new(first_run_limit: usize) -> Self {
        Self { first_run_limit }
    }

    /// Process one batch against the store.
    ///
    /// Store read failures are treated as "never seen" (re-emitting is
    /// safer than crashing); a write failure aborts the batch because it
    /// would break the idempotent re-run guarantee.
    pub async fn process(
        &self,
        batch: &[ContentItem],
        store: &dyn TrackingStore,
    ) -> Result<Vec<Emission>> {
        // Snapshot store state at batch start so later writes in this
        // batch cannot influence earlier-read decisions.
        let mut snapshot: Vec<Option<TrackedState>> = Vec::with_capacity(batch.len());
        for item in batch {
            let state = match store.get(&item.source_id).await {
                Ok(state) => state,
                Err(error) => {
                    log::warn!(
                        "Store read failed for {}, treating as unseen: {error}",
                        item.source_id
                    );
                    None
                }
            };
            snapshot.push(state);
        }

        let is_first_run = snapshot.iter().all(Option::is_none);
        let mut emissions = Vec::new();
        let mut accepted_new = 0usize;

        for (item, state) in batch.iter().zip(&snapshot) {
            // Unconditional upsert: suppressed and unchanged items still
            // contribute to future update detection. The decision below
            // uses only the batch-start snapshot.
            let stored = store
                .upsert(&item.source_id, item.kind, item.activity_count)
                .await?;

            match state {
                None => {
                    let suppressed = is_first_run && accepted_new >= self.first_run_limit;
                    if suppressed {
                        log::debug!(
                            "First-run limit reached, persisting {} without emission",
                            item.source_id
                        );
                    } else {
                        accepted_new += 1;
                        emissions.push(Emission {
                            item: item.clone(),
                            change: Change::New {
                                count: item.activity_count,
                            },
                            state: stored,
                        });
                    }
                }
                Some(state) if item.activity_count > state.counter => {
                    emissions.push(Emission {
                        item: item.clone(),
                        change: Change::Updated {
                            previous: state.counter,
                            delta: item.activity_count - state.counter,
                        },
                        state: stored,
                    });
                }
                Some(_) => {
                    // Unchanged: refreshed above, never emitted
                }
            }
        }

        Ok(emissions)
    }
}
