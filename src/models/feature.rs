//! Feature catalog data structures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel feature id for the catch-all bucket. Content that matches
/// nothing in the taxonomy lands here and waits for manual triage.
pub const GENERAL_FEATURE_ID: &str = "general";

/// Rollout lifecycle of a feature option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Announced, not yet available anywhere
    Pending,
    /// Available in feature preview (beta)
    Preview,
    /// Available, disabled by default
    Optional,
    /// Available, enabled by default
    DefaultOn,
    /// Fully released, no longer a toggle
    Released,
    /// Scheduled for or past removal
    Deprecated,
}

/// A canonical top-level product capability.
///
/// The identifier is immutable; features are created once from the seed
/// catalog. The description is filled by out-of-band enrichment, never by
/// the classification core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feature {
    /// Stable identifier, e.g. "gradebook"
    pub id: String,

    /// Display name, e.g. "Gradebook"
    pub display_name: String,

    /// Whether the feature itself has been retired
    #[serde(default)]
    pub deprecated: bool,

    /// Optional generated description
    #[serde(default)]
    pub description: Option<String>,
}

/// A sub-capability with its own deployment lifecycle, owned by exactly
/// one [`Feature`]. Created the first time a bulletin entry unambiguously
/// announces it; afterwards only updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureOption {
    /// Stable identifier
    pub id: String,

    /// Owning feature id
    pub feature_id: String,

    /// Human name as first announced
    pub name: String,

    /// Authoritative string used for exact matching, if known
    #[serde(default)]
    pub canonical_name: Option<String>,

    /// Current rollout status
    pub status: LifecycleStatus,

    /// Configuration level, e.g. "Account"
    #[serde(default)]
    pub config_level: Option<String>,

    /// Beta availability date
    #[serde(default)]
    pub beta_date: Option<NaiveDate>,

    /// Production availability date
    #[serde(default)]
    pub production_date: Option<NaiveDate>,

    /// Deprecation date
    #[serde(default)]
    pub deprecation_date: Option<NaiveDate>,

    /// Date the option was first announced, when no rollout date is known
    #[serde(default)]
    pub first_announced: Option<NaiveDate>,

    /// Derived human-readable status sentence; recomputed on every
    /// lifecycle transition
    #[serde(default)]
    pub status_text: String,
}

impl FeatureOption {
    /// Create a new option in the pending state.
    pub fn new(
        id: impl Into<String>,
        feature_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            feature_id: feature_id.into(),
            canonical_name: Some(name.clone()),
            name,
            status: LifecycleStatus::Pending,
            config_level: None,
            beta_date: None,
            production_date: None,
            deprecation_date: None,
            first_announced: None,
            status_text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_option_defaults() {
        let opt = FeatureOption::new("grade-override", "gradebook", "Final Grade Override");
        assert_eq!(opt.status, LifecycleStatus::Pending);
        assert_eq!(opt.canonical_name.as_deref(), Some("Final Grade Override"));
        assert!(opt.beta_date.is_none());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&LifecycleStatus::DefaultOn).unwrap();
        assert_eq!(json, "\"default_on\"");
    }
}
