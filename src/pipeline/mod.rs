//! Pipeline entry points for tracker operations.
//!
//! - `detect`: incremental new/updated/unchanged partitioning
//! - `lifecycle`: option lifecycle updates and status text derivation
//! - `run`: batch orchestration from fetched content to the output sink

pub mod detect;
pub mod lifecycle;
pub mod run;

pub use detect::{Change, ChangeDetector, Emission};
pub use lifecycle::{OptionUpdate, apply_update, derive_status};
pub use run::{BatchOutcome, EmittedBatch, EmittedItem, JsonFileSink, OutputSink};
