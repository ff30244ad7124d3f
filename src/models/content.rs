//! Content item data structures.
//!
//! A [`ContentItem`] is one fetched unit from any source: a release
//! bulletin page, a Q&A post, or a blog post. Identity comes from the
//! origin (`source_id`), not from a content hash, so it survives re-fetch.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a fetched content unit. Closed set; dispatch on this,
/// never on open-ended polymorphism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Release/deploy bulletin page
    Bulletin,
    /// Community Q&A post
    Question,
    /// Blog-style post
    Blog,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Bulletin => "bulletin",
            ContentKind::Question => "question",
            ContentKind::Blog => "blog",
        }
    }
}

/// How confidently a content item references a feature.
///
/// Variants are declared weakest-first so the derived `Ord` makes
/// `announces` the maximum; deduplication keeps the strongest mention
/// per (feature, option) pair by taking `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MentionType {
    Mentions,
    Feedback,
    Discusses,
    Questions,
    Announces,
}

impl MentionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionType::Mentions => "mentions",
            MentionType::Feedback => "feedback",
            MentionType::Discusses => "discusses",
            MentionType::Questions => "questions",
            MentionType::Announces => "announces",
        }
    }
}

/// One fetched content unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    /// Stable identifier derived from the origin URL
    pub source_id: String,

    /// Content kind
    pub kind: ContentKind,

    /// Item title
    pub title: String,

    /// Item body text
    pub body: String,

    /// Full URL to the item
    pub link: String,

    /// Monotonic activity counter (reply/comment count). An increase is
    /// the sole trigger for "updated" classification.
    pub activity_count: u64,

    /// Anonymized replies, when the source exposes them
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Association between a content item and a (feature, option) pair.
///
/// At most one ref exists per (source_id, feature_id, option_id) triple;
/// competing candidates collapse to the strongest mention type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentFeatureRef {
    pub source_id: String,
    pub feature_id: String,
    pub option_id: Option<String>,
    pub mention: MentionType,
}

/// An inline lifecycle-date annotation on a bulletin entry, e.g.
/// `[Added 2026-07-18]` or `[Delayed as of July 18, 2026]`. Overrides the
/// page-level date default for that one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "date")]
pub enum DateAnnotation {
    Added(NaiveDate),
    Delayed(NaiveDate),
}

impl DateAnnotation {
    pub fn date(&self) -> NaiveDate {
        match self {
            DateAnnotation::Added(d) | DateAnnotation::Delayed(d) => *d,
        }
    }
}

/// Structured configuration attributes captured from an entry's
/// `Key: Value` block, when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Name of the feature option being configured, if stated
    pub option_name: Option<String>,

    /// Configuration level, e.g. "Account" or "Course"
    pub level: Option<String>,

    /// Default enablement state as written, e.g. "Off"
    pub default_state: Option<String>,

    /// Remaining key/value attributes, key order preserved by sort
    pub extra: std::collections::BTreeMap<String, String>,
}

impl ConfigSnapshot {
    pub fn is_empty(&self) -> bool {
        self.option_name.is_none()
            && self.level.is_none()
            && self.default_state.is_none()
            && self.extra.is_empty()
    }
}

/// One structured entry extracted from a bulletin-type content item.
///
/// The anchor id is the dedup key within a document: re-parsing the same
/// page must not create a duplicate announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureAnnouncement {
    /// Source id of the bulletin this entry came from
    pub source_id: String,

    /// Page-local anchor identifier
    pub anchor: String,

    /// Section heading the entry sits under
    pub section: String,

    /// Category heading within the section (empty if none)
    pub category: String,

    /// Entry title
    pub title: String,

    /// Raw entry body
    pub body: String,

    /// Structured config attributes, if the entry carried a config block
    pub config: Option<ConfigSnapshot>,

    /// Inline date annotation, if present
    pub date_note: Option<DateAnnotation>,

    /// Resolved feature, once classified
    pub feature_id: Option<String>,

    /// Resolved option, once classified
    pub option_id: Option<String>,
}

/// An anonymized reply under a discussion content item.
///
/// No identity or author field is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    /// Position in thread, 1-based
    pub position: u32,

    /// When the reply was posted
    pub posted_at: DateTime<Utc>,

    /// Reply text
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_type_total_order() {
        assert!(MentionType::Announces > MentionType::Questions);
        assert!(MentionType::Questions > MentionType::Discusses);
        assert!(MentionType::Discusses > MentionType::Feedback);
        assert!(MentionType::Feedback > MentionType::Mentions);
    }

    #[test]
    fn test_mention_type_max_is_announces() {
        let all = [
            MentionType::Mentions,
            MentionType::Announces,
            MentionType::Discusses,
            MentionType::Questions,
            MentionType::Feedback,
        ];
        assert_eq!(all.iter().max(), Some(&MentionType::Announces));
    }

    #[test]
    fn test_comment_carries_no_identity() {
        let comment = Comment {
            position: 1,
            posted_at: Utc::now(),
            body: "It works now".to_string(),
        };
        let value = serde_json::to_value(&comment).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["body", "position", "posted_at"]);
    }

    #[test]
    fn test_date_annotation_date() {
        let d = NaiveDate::from_ymd_opt(2026, 7, 18).unwrap();
        assert_eq!(DateAnnotation::Added(d).date(), d);
        assert_eq!(DateAnnotation::Delayed(d).date(), d);
    }
}
