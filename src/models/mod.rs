// src/models/mod.rs

//! Domain models for the tracker application.
//!
//! This module contains all data structures used throughout the
//! application, organized by their primary purpose.

mod config;
mod content;
mod feature;

// Re-export all public types
pub use config::{
    ClassifierConfig, CleaningConfig, Config, FeatureSeed, FetchConfig, LimitsConfig,
    SourcePattern,
};
pub use content::{
    Comment, ConfigSnapshot, ContentFeatureRef, ContentItem, ContentKind, DateAnnotation,
    FeatureAnnouncement, MentionType,
};
pub use feature::{Feature, FeatureOption, GENERAL_FEATURE_ID, LifecycleStatus};
