// src/pipeline/run.rs

//! Batch orchestration.
//!
//! Wires the parser, resolver, change detector, and lifecycle tracker
//! together for one pre-partitioned batch of a single content kind, and
//! hands the emitted items to an output sink. Batches are idempotent to
//! re-run: everything downstream of the detector is driven by upserts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{
    ContentFeatureRef, ContentItem, ContentKind, FeatureAnnouncement, FeatureOption,
    GENERAL_FEATURE_ID,
};
use crate::parser::{PageDefaults, PageSource, parse_page};
use crate::pipeline::detect::{Change, ChangeDetector, Emission};
use crate::pipeline::lifecycle::{OptionUpdate, apply_update};
use crate::resolver::{EntityResolver, FeatureMatch};
use crate::store::TrackingStore;
use crate::taxonomy::InMemoryTaxonomy;

/// One emitted item with its resolved feature refs and tracking times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedItem {
    pub item: ContentItem,
    pub change: Change,
    pub refs: Vec<ContentFeatureRef>,

    /// Structured bulletin entries, linked to features/options where
    /// resolved. Empty for discussion items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub announcements: Vec<FeatureAnnouncement>,

    /// When this item was first tracked
    pub first_seen: DateTime<Utc>,

    /// When this item was last observed
    pub last_checked: DateTime<Utc>,
}

/// The batch payload handed to the output consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedBatch {
    pub kind: ContentKind,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<EmittedItem>,
}

/// Consumer boundary. Rendering to any wire format is entirely the
/// consumer's concern.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn publish(&self, batch: &EmittedBatch) -> Result<()>;
}

/// Summary of one processed batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub total: usize,
    pub new_count: usize,
    pub updated_count: usize,
    pub options_registered: usize,
    pub options_changed: usize,
}

/// Process one batch of discussion items (questions or blog posts).
pub async fn run_discussion_batch(
    kind: ContentKind,
    items: &[ContentItem],
    resolver: &EntityResolver,
    detector: &ChangeDetector,
    store: &dyn TrackingStore,
    sink: &dyn OutputSink,
) -> Result<BatchOutcome> {
    let emissions = detector.process(items, store).await?;

    let mut outcome = BatchOutcome {
        total: items.len(),
        ..BatchOutcome::default()
    };
    let mut emitted = Vec::with_capacity(emissions.len());

    for emission in emissions {
        let is_first = matches!(emission.change, Change::New { .. });
        match emission.change {
            Change::New { .. } => outcome.new_count += 1,
            Change::Updated { .. } => outcome.updated_count += 1,
        }

        let matches = resolver
            .resolve(&emission.item.title, &emission.item.body, kind, is_first)
            .await;
        let refs = matches
            .into_iter()
            .map(|m| ContentFeatureRef {
                source_id: emission.item.source_id.clone(),
                feature_id: m.feature_id,
                option_id: m.option_id,
                mention: m.mention,
            })
            .collect();

        emitted.push(EmittedItem {
            item: emission.item,
            change: emission.change,
            refs,
            announcements: Vec::new(),
            first_seen: emission.state.first_seen,
            last_checked: emission.state.last_checked,
        });
    }

    publish(sink, kind, emitted).await?;

    log::info!(
        "{} batch: {} items, {} new, {} updated",
        kind.as_str(),
        outcome.total,
        outcome.new_count,
        outcome.updated_count
    );
    Ok(outcome)
}

/// Process one batch of bulletin pages.
///
/// Parses each page, registers brand-new options announced by entries
/// (the one place the taxonomy is mutated, and it happens here in the
/// caller layer, not in the resolver), applies lifecycle updates, then
/// runs detection and resolution over the page items.
pub async fn run_bulletin_batch(
    fetched: &[(ContentItem, PageSource)],
    taxonomy: &mut InMemoryTaxonomy,
    detector: &ChangeDetector,
    store: &dyn TrackingStore,
    sink: &dyn OutputSink,
    today: chrono::NaiveDate,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome {
        total: fetched.len(),
        ..BatchOutcome::default()
    };

    // Stage 1: parse pages, register newly announced options so the
    // resolver snapshot below already knows them, and link each
    // announcing entry to what it registered.
    let mut parsed_pages = Vec::with_capacity(fetched.len());
    for (item, page) in fetched {
        let mut parsed = parse_page(page);
        let defaults = parsed.defaults;
        for entry in &mut parsed.entries {
            if let Some(option) = announced_option(entry, taxonomy) {
                let option_id = option.id.clone();
                let feature_id = option.feature_id.clone();
                taxonomy.register_option(option)?;
                outcome.options_registered += 1;
                entry.feature_id = Some(feature_id);
                entry.option_id = Some(option_id.clone());

                let update = announcement_update(entry, &defaults);
                if !update.is_empty() {
                    if let Some(opt) = taxonomy.option_mut(&option_id) {
                        if apply_update(opt, &update, today) {
                            outcome.options_changed += 1;
                        }
                    }
                }
            }
        }
        parsed_pages.push((item.clone(), parsed));
    }

    // Stage 2: detect, then resolve each emitted page's entries against
    // the refreshed taxonomy, linking entries as they resolve.
    let items: Vec<ContentItem> = parsed_pages.iter().map(|(item, _)| item.clone()).collect();
    let resolver = EntityResolver::new(taxonomy);
    let emissions = detector.process(&items, store).await?;
    let mut by_id: HashMap<String, Emission> = emissions
        .into_iter()
        .map(|emission| (emission.item.source_id.clone(), emission))
        .collect();

    let mut emitted = Vec::with_capacity(by_id.len());
    for (item, mut parsed) in parsed_pages {
        let Some(emission) = by_id.remove(&item.source_id) else {
            continue;
        };
        let is_first = matches!(emission.change, Change::New { .. });
        match emission.change {
            Change::New { .. } => outcome.new_count += 1,
            Change::Updated { .. } => outcome.updated_count += 1,
        }

        // Resolve each entry of the page and union the resulting refs
        let mut refs: Vec<ContentFeatureRef> = Vec::new();
        for entry in &mut parsed.entries {
            let matches = resolver
                .resolve(&entry.title, &entry.body, ContentKind::Bulletin, is_first)
                .await;
            link_entry(entry, &matches);
            for m in matches {
                let candidate = ContentFeatureRef {
                    source_id: item.source_id.clone(),
                    feature_id: m.feature_id,
                    option_id: m.option_id,
                    mention: m.mention,
                };
                merge_ref(&mut refs, candidate);
            }
        }

        emitted.push(EmittedItem {
            item,
            change: emission.change,
            refs,
            announcements: parsed.entries,
            first_seen: emission.state.first_seen,
            last_checked: emission.state.last_checked,
        });
    }

    publish(sink, ContentKind::Bulletin, emitted).await?;

    log::info!(
        "bulletin batch: {} pages, {} new, {} updated, {} options registered",
        outcome.total,
        outcome.new_count,
        outcome.updated_count,
        outcome.options_registered
    );
    Ok(outcome)
}

/// Keep at most one ref per (feature, option) pair, strongest mention.
fn merge_ref(refs: &mut Vec<ContentFeatureRef>, candidate: ContentFeatureRef) {
    if let Some(existing) = refs
        .iter_mut()
        .find(|r| r.feature_id == candidate.feature_id && r.option_id == candidate.option_id)
    {
        existing.mention = existing.mention.max(candidate.mention);
    } else {
        refs.push(candidate);
    }
}

/// Link an entry to the strongest non-catch-all match, preferring option
/// matches over bare feature matches. Linkage made at registration time
/// is kept.
fn link_entry(entry: &mut FeatureAnnouncement, matches: &[FeatureMatch]) {
    if entry.feature_id.is_some() {
        return;
    }
    let best = matches
        .iter()
        .filter(|m| m.feature_id != GENERAL_FEATURE_ID)
        .max_by_key(|m| (m.option_id.is_some(), m.mention));
    if let Some(m) = best {
        entry.feature_id = Some(m.feature_id.clone());
        entry.option_id = m.option_id.clone();
    }
}

/// A bulletin entry unambiguously announces a new option when it names
/// one in its config block and its category maps to a known feature.
fn announced_option(
    entry: &FeatureAnnouncement,
    taxonomy: &InMemoryTaxonomy,
) -> Option<FeatureOption> {
    let config = entry.config.as_ref()?;
    let name = config.option_name.as_deref()?.trim();
    if name.is_empty() {
        return None;
    }

    let feature_id = taxonomy.feature_id_by_name(&entry.category)?.to_string();

    // Already registered under this canonical name: nothing to create
    if taxonomy.option_id_by_canonical_name(name).is_some() {
        return None;
    }

    Some(FeatureOption::new(slugify(name), feature_id, name))
}

/// Lifecycle update for an announced option: page-level date defaults,
/// overridden by the entry's inline annotation; config block determines
/// the initial status.
fn announcement_update(entry: &FeatureAnnouncement, defaults: &PageDefaults) -> OptionUpdate {
    use crate::models::{DateAnnotation, LifecycleStatus};

    let mut update = OptionUpdate {
        beta_date: defaults.beta_date,
        production_date: defaults.production_date,
        ..OptionUpdate::default()
    };

    match entry.date_note {
        Some(DateAnnotation::Added(date)) | Some(DateAnnotation::Delayed(date)) => {
            update.production_date = Some(date);
        }
        None => {}
    }

    if let Some(config) = &entry.config {
        update.config_level = config.level.clone();
        update.status = Some(match config.default_state.as_deref() {
            Some(state) if state.eq_ignore_ascii_case("on") => LifecycleStatus::DefaultOn,
            _ => LifecycleStatus::Optional,
        });
    }

    if update.beta_date.is_none() && update.production_date.is_none() {
        update.first_announced = entry.date_note.map(|note| note.date());
    }

    update
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

async fn publish(sink: &dyn OutputSink, kind: ContentKind, items: Vec<EmittedItem>) -> Result<()> {
    let batch = EmittedBatch {
        kind,
        generated_at: Utc::now(),
        items,
    };
    sink.publish(&batch).await
}

/// Output sink that writes each batch to `emitted/{kind}.json`.
pub struct JsonFileSink {
    root_dir: std::path::PathBuf,
}

impl JsonFileSink {
    pub fn new(root_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl OutputSink for JsonFileSink {
    async fn publish(&self, batch: &EmittedBatch) -> Result<()> {
        let path = self
            .root_dir
            .join("emitted")
            .join(format!("{}.json", batch.kind.as_str()));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(batch)?;
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await.map_err(AppError::Io)
    }
}

/// Sink that drops everything, for dry runs.
pub struct NullSink;

#[async_trait]
impl OutputSink for NullSink {
    async fn publish(&self, _batch: &EmittedBatch) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, MentionType};
    use crate::parser::DocNode;
    use crate::store::MemoryTrackingStore;
    use std::sync::Mutex;

    struct CaptureSink {
        batches: Mutex<Vec<EmittedBatch>>,
    }

    impl CaptureSink {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
            }
        }

        fn take(&self) -> Vec<EmittedBatch> {
            self.batches.lock().unwrap().drain(..).collect()
        }
    }

    #[async_trait]
    impl OutputSink for CaptureSink {
        async fn publish(&self, batch: &EmittedBatch) -> Result<()> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn question(id: &str, title: &str, count: u64) -> ContentItem {
        ContentItem {
            source_id: id.to_string(),
            kind: ContentKind::Question,
            title: title.to_string(),
            body: String::new(),
            link: format!("https://community.example.com/td-p/{id}"),
            activity_count: count,
            comments: Vec::new(),
        }
    }

    fn bulletin_page() -> (ContentItem, PageSource) {
        let url = "https://community.example.com/release-notes/td-p/900100";
        let page = PageSource {
            url: url.to_string(),
            title: "Release Notes".to_string(),
            intro: "Beta on July 4, 2026 and production on July 18, 2026.".to_string(),
            nodes: vec![
                DocNode {
                    level: 2,
                    text: "New Features".into(),
                    anchor: None,
                    body: String::new(),
                },
                DocNode {
                    level: 3,
                    text: "Gradebook".into(),
                    anchor: None,
                    body: String::new(),
                },
                DocNode {
                    level: 4,
                    text: "Final Grade Override".into(),
                    anchor: Some("toc-override".into()),
                    body: "Graders can override final grades.\n\
                           Feature Option Name: Final Grade Override\n\
                           Location to Enable Feature: Account\n\
                           Default State: Off"
                        .into(),
                },
                DocNode {
                    level: 3,
                    text: "Quizzes".into(),
                    anchor: None,
                    body: String::new(),
                },
                DocNode {
                    level: 4,
                    text: "Quizzes Log Viewer".into(),
                    anchor: Some("toc-quiz-log".into()),
                    body: "Instructors can inspect submission logs.".into(),
                },
            ],
        };
        let item = ContentItem {
            source_id: crate::utils::url::extract_source_id(url),
            kind: ContentKind::Bulletin,
            title: page.title.clone(),
            body: page.intro.clone(),
            link: url.to_string(),
            activity_count: 0,
            comments: Vec::new(),
        };
        (item, page)
    }

    #[tokio::test]
    async fn test_discussion_batch_emits_refs() {
        let taxonomy = InMemoryTaxonomy::from_catalog(&Config::default().catalog);
        let resolver = EntityResolver::new(&taxonomy);
        let detector = ChangeDetector::new(10);
        let store = MemoryTrackingStore::new();
        let sink = CaptureSink::new();

        let items = vec![question("q1", "Gradebook is broken", 2)];
        let outcome = run_discussion_batch(
            ContentKind::Question,
            &items,
            &resolver,
            &detector,
            &store,
            &sink,
        )
        .await
        .unwrap();

        assert_eq!(outcome.new_count, 1);
        let batches = sink.take();
        let emitted = &batches[0].items[0];
        assert!(emitted.refs.iter().any(|r| r.feature_id == "gradebook"));
        assert_eq!(emitted.refs[0].mention, MentionType::Questions);
        assert!(emitted.announcements.is_empty());
        assert!(emitted.first_seen <= emitted.last_checked);
    }

    #[tokio::test]
    async fn test_bulletin_batch_registers_option_and_announces() {
        let mut taxonomy = InMemoryTaxonomy::from_catalog(&Config::default().catalog);
        let detector = ChangeDetector::new(10);
        let store = MemoryTrackingStore::new();
        let sink = CaptureSink::new();

        let fetched = vec![bulletin_page()];
        let today = chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let outcome = run_bulletin_batch(&fetched, &mut taxonomy, &detector, &store, &sink, today)
            .await
            .unwrap();

        assert_eq!(outcome.options_registered, 1);
        let option = taxonomy.option("final-grade-override").unwrap();
        assert_eq!(option.feature_id, "gradebook");
        assert_eq!(option.config_level.as_deref(), Some("Account"));
        assert!(option.status_text.contains("disabled by default"));

        let batches = sink.take();
        let emitted = &batches[0].items[0];
        let option_ref = emitted
            .refs
            .iter()
            .find(|r| r.option_id.as_deref() == Some("final-grade-override"))
            .unwrap();
        assert_eq!(option_ref.mention, MentionType::Announces);

        // The announcing entry is linked to what it registered
        let entry = emitted
            .announcements
            .iter()
            .find(|a| a.anchor == "toc-override")
            .unwrap();
        assert_eq!(entry.feature_id.as_deref(), Some("gradebook"));
        assert_eq!(entry.option_id.as_deref(), Some("final-grade-override"));
    }

    #[tokio::test]
    async fn test_bulletin_entry_without_config_links_resolved_feature() {
        let mut taxonomy = InMemoryTaxonomy::from_catalog(&Config::default().catalog);
        let detector = ChangeDetector::new(10);
        let store = MemoryTrackingStore::new();
        let sink = CaptureSink::new();
        let today = chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        let fetched = vec![bulletin_page()];
        run_bulletin_batch(&fetched, &mut taxonomy, &detector, &store, &sink, today)
            .await
            .unwrap();

        let batches = sink.take();
        let entry = batches[0].items[0]
            .announcements
            .iter()
            .find(|a| a.anchor == "toc-quiz-log")
            .unwrap();
        // No config block, so no option registration; the title still
        // resolves to the quizzes feature
        assert_eq!(entry.feature_id.as_deref(), Some("quizzes"));
        assert!(entry.option_id.is_none());
    }

    #[tokio::test]
    async fn test_bulletin_rerun_is_silent() {
        let mut taxonomy = InMemoryTaxonomy::from_catalog(&Config::default().catalog);
        let detector = ChangeDetector::new(10);
        let store = MemoryTrackingStore::new();
        let sink = CaptureSink::new();
        let today = chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        let fetched = vec![bulletin_page()];
        run_bulletin_batch(&fetched, &mut taxonomy, &detector, &store, &sink, today)
            .await
            .unwrap();
        sink.take();

        let outcome = run_bulletin_batch(&fetched, &mut taxonomy, &detector, &store, &sink, today)
            .await
            .unwrap();
        assert_eq!(outcome.new_count + outcome.updated_count, 0);
        assert_eq!(outcome.options_registered, 0);
        assert!(sink.take()[0].items.is_empty());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Final Grade Override"), "final-grade-override");
        assert_eq!(slugify("  New  Quizzes! "), "new-quizzes");
    }
}
