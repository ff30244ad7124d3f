// src/taxonomy.rs

//! Read-only view over the canonical feature catalog.
//!
//! The resolver only ever reads the taxonomy; registration of brand-new
//! options happens on the concrete registry from the orchestration layer,
//! never inside the classification core.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Feature, FeatureOption, FeatureSeed, LifecycleStatus};

/// A registered feature option as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownOption {
    pub option_id: String,
    pub feature_id: String,
    /// Authoritative string used for exact matching
    pub canonical_name: String,
    pub name: String,
}

/// A canonical feature as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFeature {
    pub feature_id: String,
    pub display_name: String,
}

/// Read-only accessor over the feature catalog and registered options.
pub trait TaxonomyRegistry: Send + Sync {
    /// All registered options that carry a canonical name.
    fn list_known_options(&self) -> Vec<KnownOption>;

    /// The canonical feature catalog.
    fn list_canonical_features(&self) -> Vec<CanonicalFeature>;
}

/// In-memory taxonomy seeded from the configured catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaxonomy {
    features: Vec<Feature>,
    options: HashMap<String, FeatureOption>,
}

impl InMemoryTaxonomy {
    /// Build a taxonomy from the seed catalog.
    pub fn from_catalog(catalog: &[FeatureSeed]) -> Self {
        let features = catalog
            .iter()
            .map(|seed| Feature {
                id: seed.id.clone(),
                display_name: seed.display_name.clone(),
                deprecated: false,
                description: None,
            })
            .collect();
        Self {
            features,
            options: HashMap::new(),
        }
    }

    /// Look up a feature id by case-insensitive display name.
    pub fn feature_id_by_name(&self, name: &str) -> Option<&str> {
        let needle = name.trim();
        self.features
            .iter()
            .find(|f| f.display_name.eq_ignore_ascii_case(needle))
            .map(|f| f.id.as_str())
    }

    /// Fetch an option by id.
    pub fn option(&self, option_id: &str) -> Option<&FeatureOption> {
        self.options.get(option_id)
    }

    /// Fetch an option mutably by id.
    pub fn option_mut(&mut self, option_id: &str) -> Option<&mut FeatureOption> {
        self.options.get_mut(option_id)
    }

    /// Look up an option id by case-insensitive canonical name.
    pub fn option_id_by_canonical_name(&self, name: &str) -> Option<&str> {
        let needle = name.trim();
        self.options
            .values()
            .find(|o| {
                o.canonical_name
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(needle))
            })
            .map(|o| o.id.as_str())
    }

    /// Register a newly announced option. Fails if the owning feature is
    /// unknown; a duplicate id is a no-op (options are never recreated).
    pub fn register_option(&mut self, option: FeatureOption) -> Result<()> {
        if !self.features.iter().any(|f| f.id == option.feature_id) {
            return Err(AppError::validation(format!(
                "Cannot register option '{}': unknown feature '{}'",
                option.id, option.feature_id
            )));
        }
        self.options.entry(option.id.clone()).or_insert(option);
        Ok(())
    }

    /// Mark a feature deprecated.
    pub fn deprecate_feature(&mut self, feature_id: &str) {
        if let Some(feature) = self.features.iter_mut().find(|f| f.id == feature_id) {
            feature.deprecated = true;
        }
    }

    /// Number of registered options.
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

impl TaxonomyRegistry for InMemoryTaxonomy {
    fn list_known_options(&self) -> Vec<KnownOption> {
        let mut known: Vec<KnownOption> = self
            .options
            .values()
            .filter(|o| o.status != LifecycleStatus::Deprecated)
            .filter_map(|o| {
                o.canonical_name.as_ref().map(|canonical| KnownOption {
                    option_id: o.id.clone(),
                    feature_id: o.feature_id.clone(),
                    canonical_name: canonical.clone(),
                    name: o.name.clone(),
                })
            })
            .collect();
        // Stable order for deterministic matching
        known.sort_by(|a, b| a.option_id.cmp(&b.option_id));
        known
    }

    fn list_canonical_features(&self) -> Vec<CanonicalFeature> {
        self.features
            .iter()
            .filter(|f| !f.deprecated)
            .map(|f| CanonicalFeature {
                feature_id: f.id.clone(),
                display_name: f.display_name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn seeded() -> InMemoryTaxonomy {
        InMemoryTaxonomy::from_catalog(&Config::default().catalog)
    }

    #[test]
    fn test_seed_catalog_features() {
        let tax = seeded();
        assert!(tax.feature_id_by_name("Gradebook").is_some());
        assert_eq!(tax.feature_id_by_name("gradebook"), Some("gradebook"));
        assert!(tax.feature_id_by_name("Nonexistent").is_none());
    }

    #[test]
    fn test_register_option_requires_known_feature() {
        let mut tax = seeded();
        let bad = FeatureOption::new("opt", "no-such-feature", "Option");
        assert!(tax.register_option(bad).is_err());

        let good = FeatureOption::new("grade-override", "gradebook", "Final Grade Override");
        assert!(tax.register_option(good).is_ok());
        assert_eq!(tax.option_count(), 1);
    }

    #[test]
    fn test_register_duplicate_is_noop() {
        let mut tax = seeded();
        let opt = FeatureOption::new("grade-override", "gradebook", "Final Grade Override");
        tax.register_option(opt.clone()).unwrap();

        let mut renamed = opt;
        renamed.name = "Renamed".to_string();
        tax.register_option(renamed).unwrap();

        assert_eq!(tax.option("grade-override").unwrap().name, "Final Grade Override");
    }

    #[test]
    fn test_known_options_skip_deprecated() {
        let mut tax = seeded();
        let mut opt = FeatureOption::new("old-quiz", "quizzes", "Classic Quizzes");
        opt.status = LifecycleStatus::Deprecated;
        tax.register_option(opt).unwrap();
        assert!(tax.list_known_options().is_empty());
    }
}
