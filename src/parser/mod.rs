// src/parser/mod.rs

//! Bulletin document parser.
//!
//! Converts one fetched page into an ordered page representation:
//! page-level lifecycle-date defaults, a list of upcoming change
//! date/description pairs, and structured entries grouped by section and
//! category. A malformed individual entry is skipped and logged; it never
//! aborts parsing of the rest of the page.

pub mod dates;

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ConfigSnapshot, DateAnnotation, FeatureAnnouncement};
use crate::utils::url::extract_source_id;

/// One pre-extracted heading node of a fetched page. The DOM walk that
/// produces these lives in the fetch service; the parser itself does no
/// network or markup I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocNode {
    /// Heading level (2 = section, 3 = category, 4 = entry)
    pub level: u8,
    /// Heading text
    pub text: String,
    /// Page-local anchor id, if the heading carries one
    pub anchor: Option<String>,
    /// Body text between this heading and the next
    pub body: String,
}

/// Raw page content plus its URL/title metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSource {
    pub url: String,
    pub title: String,
    /// Introductory text before the first section heading
    pub intro: String,
    pub nodes: Vec<DocNode>,
}

/// Page-level lifecycle-date defaults parsed from the intro sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageDefaults {
    pub beta_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
}

/// A dated upcoming-change note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingChange {
    pub date: NaiveDate,
    pub description: String,
}

/// The ordered page representation produced by [`parse_page`].
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub source_id: String,
    pub defaults: PageDefaults,
    pub upcoming: Vec<UpcomingChange>,
    pub entries: Vec<FeatureAnnouncement>,
}

/// Parse one bulletin page into its structured representation.
pub fn parse_page(page: &PageSource) -> ParsedPage {
    let source_id = extract_source_id(&page.url);

    let defaults = PageDefaults {
        beta_date: dates::date_after_keyword(&page.intro, "beta"),
        production_date: dates::date_after_keyword(&page.intro, "production"),
    };

    let mut parsed = ParsedPage {
        source_id: source_id.clone(),
        defaults,
        ..ParsedPage::default()
    };

    let mut section = String::new();
    let mut category = String::new();
    let mut in_upcoming = false;
    let mut seen_anchors: HashSet<String> = HashSet::new();

    for node in &page.nodes {
        match node.level {
            0..=2 => {
                section = node.text.trim().to_string();
                category.clear();
                in_upcoming = section.to_lowercase().contains("upcoming");
            }
            3 if in_upcoming => {
                if let Some(change) = parse_upcoming(node) {
                    parsed.upcoming.push(change);
                }
            }
            3 => {
                category = node.text.trim().to_string();
            }
            _ if in_upcoming => {
                if let Some(change) = parse_upcoming(node) {
                    parsed.upcoming.push(change);
                }
            }
            _ => match parse_entry(node, &source_id, &section, &category) {
                Some(entry) => {
                    // Anchor is the dedup key within a document
                    if seen_anchors.insert(entry.anchor.clone()) {
                        parsed.entries.push(entry);
                    } else {
                        log::debug!("Duplicate anchor '{}' skipped", entry.anchor);
                    }
                }
                None => {
                    log::warn!(
                        "Skipping malformed entry '{}' (anchor: {:?}) on {}",
                        node.text.trim(),
                        node.anchor,
                        page.url
                    );
                }
            },
        }
    }

    parsed
}

/// Parse an upcoming-change node. Requires a date somewhere in the
/// heading or body.
fn parse_upcoming(node: &DocNode) -> Option<UpcomingChange> {
    let combined = format!("{} {}", node.text, node.body);
    let date = dates::parse_first_date(&combined)?;
    Some(UpcomingChange {
        date,
        description: dates::strip_annotation(&node.text),
    })
}

/// Parse one entry node. An entry without an anchor or with an empty
/// title is malformed.
fn parse_entry(
    node: &DocNode,
    source_id: &str,
    section: &str,
    category: &str,
) -> Option<FeatureAnnouncement> {
    let anchor = node.anchor.as_deref()?.trim().to_string();
    if anchor.is_empty() {
        return None;
    }

    let title = dates::strip_annotation(&node.text);
    if title.is_empty() {
        return None;
    }

    // The inline annotation may sit in the heading or in the body text
    let date_note: Option<DateAnnotation> =
        dates::parse_annotation(&node.text).or_else(|| dates::parse_annotation(&node.body));

    Some(FeatureAnnouncement {
        source_id: source_id.to_string(),
        anchor,
        section: section.to_string(),
        category: category.to_string(),
        title,
        body: node.body.trim().to_string(),
        config: parse_config_block(&node.body),
        date_note,
        feature_id: None,
        option_id: None,
    })
}

/// Extract `Key: Value` configuration lines from an entry body.
fn parse_config_block(body: &str) -> Option<ConfigSnapshot> {
    let mut snapshot = ConfigSnapshot::default();

    for line in body.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        // Skip URLs and prose sentences masquerading as key/value pairs
        if value.is_empty()
            || value.starts_with("//")
            || key.is_empty()
            || key.len() > 40
            || !key.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '/')
        {
            continue;
        }

        let key_lower = key.to_lowercase();
        if key_lower.contains("feature option") || key_lower.contains("feature name") {
            snapshot.option_name = Some(value.to_string());
        } else if key_lower.contains("level") || key_lower.contains("location") {
            snapshot.level = Some(value.to_string());
        } else if key_lower.contains("default") {
            snapshot.default_state = Some(value.to_string());
        } else {
            snapshot.extra.insert(key_lower, value.to_string());
        }
    }

    if snapshot.is_empty() {
        None
    } else {
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(level: u8, text: &str, anchor: Option<&str>, body: &str) -> DocNode {
        DocNode {
            level,
            text: text.to_string(),
            anchor: anchor.map(String::from),
            body: body.to_string(),
        }
    }

    fn sample_page() -> PageSource {
        PageSource {
            url: "https://community.example.com/release-notes/2026-07-18/td-p/443322".into(),
            title: "Release Notes (2026-07-18)".into(),
            intro: "Features in this release hit beta on July 4, 2026 and production on \
                    July 18, 2026."
                .into(),
            nodes: vec![
                node(2, "New Features", None, ""),
                node(3, "Gradebook", None, ""),
                node(
                    4,
                    "Final Grade Override",
                    Some("toc-gradebook-override"),
                    "Graders can override a student's final grade.\n\
                     Feature Option Name: Final Grade Override\n\
                     Location to Enable Feature: Account Settings\n\
                     Default State: Off",
                ),
                node(
                    4,
                    "Broken Entry Without Anchor",
                    None,
                    "This one is malformed.",
                ),
                node(2, "Upcoming Changes", None, ""),
                node(
                    3,
                    "Classic Quizzes Sunset",
                    None,
                    "Scheduled for June 30, 2027.",
                ),
            ],
        }
    }

    #[test]
    fn test_page_defaults_from_intro() {
        let parsed = parse_page(&sample_page());
        assert_eq!(
            parsed.defaults.beta_date,
            NaiveDate::from_ymd_opt(2026, 7, 4)
        );
        assert_eq!(
            parsed.defaults.production_date,
            NaiveDate::from_ymd_opt(2026, 7, 18)
        );
    }

    #[test]
    fn test_entry_extraction_with_config() {
        let parsed = parse_page(&sample_page());
        assert_eq!(parsed.entries.len(), 1);

        let entry = &parsed.entries[0];
        assert_eq!(entry.section, "New Features");
        assert_eq!(entry.category, "Gradebook");
        assert_eq!(entry.anchor, "toc-gradebook-override");

        let config = entry.config.as_ref().unwrap();
        assert_eq!(config.option_name.as_deref(), Some("Final Grade Override"));
        assert_eq!(config.level.as_deref(), Some("Account Settings"));
        assert_eq!(config.default_state.as_deref(), Some("Off"));
    }

    #[test]
    fn test_malformed_entry_skipped_not_fatal() {
        // The anchor-less entry is dropped; parsing continues past it
        let parsed = parse_page(&sample_page());
        assert!(parsed.entries.iter().all(|e| !e.title.contains("Broken")));
        assert_eq!(parsed.upcoming.len(), 1);
    }

    #[test]
    fn test_upcoming_changes() {
        let parsed = parse_page(&sample_page());
        assert_eq!(parsed.upcoming[0].description, "Classic Quizzes Sunset");
        assert_eq!(
            parsed.upcoming[0].date,
            NaiveDate::from_ymd_opt(2027, 6, 30).unwrap()
        );
    }

    #[test]
    fn test_reparse_produces_no_duplicate_anchors() {
        let mut page = sample_page();
        // Simulate a page that repeats an anchor
        let dup = page.nodes[2].clone();
        page.nodes.push(dup);

        let parsed = parse_page(&page);
        let anchors: Vec<_> = parsed.entries.iter().map(|e| e.anchor.as_str()).collect();
        let unique: HashSet<_> = anchors.iter().collect();
        assert_eq!(anchors.len(), unique.len());
    }

    #[test]
    fn test_inline_annotation_override() {
        let page = PageSource {
            url: "https://community.example.com/release-notes/td-p/1".into(),
            title: "notes".into(),
            intro: String::new(),
            nodes: vec![
                node(2, "Updated Features", None, ""),
                node(
                    4,
                    "Quiz Logs [Delayed as of July 20, 2026]",
                    Some("toc-quiz-logs"),
                    "Delayed due to a regression.",
                ),
            ],
        };

        let parsed = parse_page(&page);
        let entry = &parsed.entries[0];
        assert_eq!(entry.title, "Quiz Logs");
        assert_eq!(
            entry.date_note,
            Some(DateAnnotation::Delayed(
                NaiveDate::from_ymd_opt(2026, 7, 20).unwrap()
            ))
        );
    }
}
