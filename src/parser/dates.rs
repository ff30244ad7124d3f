// src/parser/dates.rs

//! Date pattern extraction for bulletin pages.
//!
//! Pages carry dates in two shapes: ISO (`2026-07-18`) and long form
//! (`July 18, 2026`). Inline annotations like `[Added 2026-07-18]` or
//! `[Delayed as of July 18, 2026]` override page-level defaults for a
//! single entry.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::DateAnnotation;

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"))
}

fn long_form_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),?\s+(\d{4})\b",
        )
        .expect("valid regex")
    })
}

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[(added|delayed(?:\s+as\s+of)?)\s+([^\]]+)\]").expect("valid regex")
    })
}

/// Parse the first date found in the text, trying ISO before long form.
/// ISO-shaped tokens that are not real calendar dates are skipped, not
/// treated as the end of the scan.
pub fn parse_first_date(text: &str) -> Option<NaiveDate> {
    for caps in iso_re().captures_iter(text) {
        let (Ok(year), Ok(month), Ok(day)) =
            (caps[1].parse(), caps[2].parse(), caps[3].parse())
        else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    let caps = long_form_re().captures(text)?;
    let month = month_number(&caps[1])?;
    NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[2].parse().ok()?)
}

/// Parse an inline `[Added ...]` / `[Delayed as of ...]` annotation.
pub fn parse_annotation(text: &str) -> Option<DateAnnotation> {
    let caps = annotation_re().captures(text)?;
    let date = parse_first_date(&caps[2])?;
    if caps[1].to_lowercase().starts_with("delayed") {
        Some(DateAnnotation::Delayed(date))
    } else {
        Some(DateAnnotation::Added(date))
    }
}

/// Remove any inline annotation from the text.
pub fn strip_annotation(text: &str) -> String {
    annotation_re().replace_all(text, "").trim().to_string()
}

/// Parse the first date appearing after a keyword, case-insensitively.
/// Used for page-level defaults ("beta release on July 18, 2026 and
/// production release on August 15, 2026").
pub fn date_after_keyword(text: &str, keyword: &str) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    let pos = lower.find(&keyword.to_lowercase())?;
    // Offsets into the lowercase copy can disagree with the original on
    // non-ASCII text; bail out instead of slicing mid-character.
    parse_first_date(text.get(pos..)?)
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "January" => 1,
        "February" => 2,
        "March" => 3,
        "April" => 4,
        "May" => 5,
        "June" => 6,
        "July" => 7,
        "August" => 8,
        "September" => 9,
        "October" => 10,
        "November" => 11,
        "December" => 12,
        _ => return None,
    };
    Some(n)
}
