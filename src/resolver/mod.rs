// src/resolver/mod.rs

//! Entity resolver.
//!
//! Resolves free-text titles and bodies to (feature, option, mention)
//! tuples using a tiered strategy: known-option canonical names first,
//! then the canonical feature catalog, then an optional classification
//! backend, and finally the catch-all bucket. Competing candidates for
//! the same (feature, option) pair collapse to the strongest mention.

pub mod classifier;
pub mod confidence;

use std::collections::HashMap;

use crate::models::{ContentKind, GENERAL_FEATURE_ID, MentionType};
use crate::taxonomy::{CanonicalFeature, KnownOption, TaxonomyRegistry};
use crate::utils::{contains_ci, truncate_chars};

pub use classifier::{Classifier, HttpClassifier, StubClassifier};
pub use confidence::{FeatureSuggestion, suggest};

/// One resolved (feature, option, mention) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMatch {
    pub feature_id: String,
    pub option_id: Option<String>,
    pub mention: MentionType,
}

/// Mention tiers (title hit, body-only hit) for a post kind.
///
/// A bulletin entry announces on first observation; a question asks
/// regardless of cycle; everything else is an update-cycle discussion.
pub fn mention_tiers(kind: ContentKind, is_first_observation: bool) -> (MentionType, MentionType) {
    match (kind, is_first_observation) {
        (ContentKind::Bulletin, true) => (MentionType::Announces, MentionType::Announces),
        (ContentKind::Question, _) => (MentionType::Questions, MentionType::Mentions),
        _ => (MentionType::Discusses, MentionType::Mentions),
    }
}

/// Resolver over a taxonomy snapshot and an optional classification
/// backend.
pub struct EntityResolver {
    options: Vec<KnownOption>,
    features: Vec<CanonicalFeature>,
    backend: Option<Box<dyn Classifier>>,
    max_input_chars: usize,
}

impl EntityResolver {
    /// Snapshot the taxonomy for this resolver. No backend; the fallback
    /// tier is disabled.
    pub fn new(taxonomy: &dyn TaxonomyRegistry) -> Self {
        Self {
            options: taxonomy.list_known_options(),
            features: taxonomy.list_canonical_features(),
            backend: None,
            max_input_chars: 1500,
        }
    }

    /// Attach a classification backend for the fallback tier.
    pub fn with_backend(mut self, backend: Box<dyn Classifier>, max_input_chars: usize) -> Self {
        self.backend = Some(backend);
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    /// The canonical feature snapshot, for the triage scorer.
    pub fn features(&self) -> &[CanonicalFeature] {
        &self.features
    }

    /// Resolve one item's title and body into deduplicated matches.
    ///
    /// Never fails: absence of matches yields the catch-all tuple, and
    /// backend errors degrade to an empty candidate list.
    pub async fn resolve(
        &self,
        title: &str,
        body: &str,
        kind: ContentKind,
        is_first_observation: bool,
    ) -> Vec<FeatureMatch> {
        let (title_tier, body_tier) = mention_tiers(kind, is_first_observation);
        let mut candidates: Vec<FeatureMatch> = Vec::new();

        // Tier 1: registered options with a canonical name
        for option in &self.options {
            if contains_ci(title, &option.canonical_name) {
                candidates.push(FeatureMatch {
                    feature_id: option.feature_id.clone(),
                    option_id: Some(option.option_id.clone()),
                    mention: title_tier,
                });
            } else if contains_ci(body, &option.canonical_name) {
                candidates.push(FeatureMatch {
                    feature_id: option.feature_id.clone(),
                    option_id: Some(option.option_id.clone()),
                    mention: body_tier,
                });
            }
        }

        // Tier 2: canonical feature names and identifiers
        for feature in &self.features {
            if feature.feature_id == GENERAL_FEATURE_ID {
                continue;
            }
            let title_hit = contains_ci(title, &feature.display_name)
                || contains_ci(title, &feature.feature_id);
            let body_hit = contains_ci(body, &feature.display_name)
                || contains_ci(body, &feature.feature_id);

            if title_hit {
                candidates.push(FeatureMatch {
                    feature_id: feature.feature_id.clone(),
                    option_id: None,
                    mention: title_tier,
                });
            } else if body_hit {
                candidates.push(FeatureMatch {
                    feature_id: feature.feature_id.clone(),
                    option_id: None,
                    mention: body_tier,
                });
            }
        }

        // Tier 3: classification backend, only when tiers 1-2 found nothing
        if candidates.is_empty() {
            candidates.extend(self.classify_fallback(title, body).await);
        }

        // Tier 4: catch-all
        if candidates.is_empty() {
            candidates.push(FeatureMatch {
                feature_id: GENERAL_FEATURE_ID.to_string(),
                option_id: None,
                mention: MentionType::Mentions,
            });
        }

        dedup_strongest(candidates)
    }

    /// Run the backend and map its lines to weak candidates. Any failure
    /// yields an empty list; never raises past this boundary.
    async fn classify_fallback(&self, title: &str, body: &str) -> Vec<FeatureMatch> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };

        let combined = format!("{title}\n\n{body}");
        let text = truncate_chars(&combined, self.max_input_chars);

        let names = match backend.classify(text).await {
            Ok(names) => names,
            Err(error) => {
                log::warn!("Classification backend failed, falling through: {error}");
                return Vec::new();
            }
        };

        names
            .iter()
            .filter_map(|name| self.feature_id_by_name(name))
            .map(|feature_id| FeatureMatch {
                feature_id: feature_id.to_string(),
                option_id: None,
                mention: MentionType::Mentions,
            })
            .collect()
    }

    fn feature_id_by_name(&self, name: &str) -> Option<&str> {
        let needle = name.trim();
        self.features
            .iter()
            .find(|f| f.display_name.eq_ignore_ascii_case(needle))
            .map(|f| f.feature_id.as_str())
    }
}

/// Collapse candidates to one entry per (feature, option) pair, keeping
/// the strongest mention. Output order is deterministic.
fn dedup_strongest(candidates: Vec<FeatureMatch>) -> Vec<FeatureMatch> {
    let mut strongest: HashMap<(String, Option<String>), MentionType> = HashMap::new();
    for candidate in candidates {
        let key = (candidate.feature_id, candidate.option_id);
        strongest
            .entry(key)
            .and_modify(|mention| *mention = (*mention).max(candidate.mention))
            .or_insert(candidate.mention);
    }

    let mut matches: Vec<FeatureMatch> = strongest
        .into_iter()
        .map(|((feature_id, option_id), mention)| FeatureMatch {
            feature_id,
            option_id,
            mention,
        })
        .collect();
    matches.sort_by(|a, b| {
        a.feature_id
            .cmp(&b.feature_id)
            .then(a.option_id.cmp(&b.option_id))
    });
    matches
}
