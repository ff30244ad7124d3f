// src/resolver/confidence.rs

//! Confidence scoring for the manual triage path.
//!
//! Produces ranked suggestions for a human reviewer moving catch-all
//! refs to a specific feature. This score never feeds the primary
//! resolver.

use unicode_segmentation::UnicodeSegmentation;

use crate::taxonomy::CanonicalFeature;
use crate::utils::{compact, contains_ci};

/// Maximum score a suggestion can reach.
pub const MAX_SCORE: u32 = 100;

/// How many suggestions the triage path surfaces.
const TOP_N: usize = 3;

/// One ranked feature suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSuggestion {
    pub feature_id: String,
    pub score: u32,
}

/// Score every catalog feature against the text and return the top
/// suggestions, sorted descending by score.
pub fn suggest(title: &str, body: &str, features: &[CanonicalFeature]) -> Vec<FeatureSuggestion> {
    let combined = format!("{title} {body}");
    let combined_lower = combined.to_lowercase();
    let combined_compact = compact(&combined);
    let title_lower = title.to_lowercase();

    let text_words: std::collections::HashSet<String> = combined_lower
        .unicode_words()
        .map(String::from)
        .collect();

    let mut suggestions: Vec<FeatureSuggestion> = features
        .iter()
        .filter_map(|feature| {
            let score = score_feature(
                feature,
                &combined_lower,
                &combined_compact,
                &title_lower,
                &text_words,
            );
            (score > 0).then(|| FeatureSuggestion {
                feature_id: feature.feature_id.clone(),
                score,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| b.score.cmp(&a.score).then(a.feature_id.cmp(&b.feature_id)));
    suggestions.truncate(TOP_N);
    suggestions
}

fn score_feature(
    feature: &CanonicalFeature,
    combined_lower: &str,
    combined_compact: &str,
    title_lower: &str,
    text_words: &std::collections::HashSet<String>,
) -> u32 {
    let mut score: u32 = 0;
    let mut matched_keywords: Vec<String> = Vec::new();

    let name_lower = feature.display_name.to_lowercase();

    // Verbatim display name in the combined text
    if combined_lower.contains(&name_lower) {
        score += 50;
        matched_keywords.push(name_lower.clone());
    }

    // Slug/identifier form with separators stripped
    let slug = compact(&feature.feature_id);
    if !slug.is_empty() && combined_compact.contains(&slug) {
        score += 40;
        matched_keywords.push(slug);
    }

    // Individual display-name words, each counted once
    for word in name_lower.unicode_words() {
        if word.len() > 3 && text_words.contains(word) {
            score += 10;
            matched_keywords.push(word.to_string());
        }
    }

    // Title bonus: any matched keyword also appears in the title
    if matched_keywords
        .iter()
        .any(|kw| contains_ci(title_lower, kw))
    {
        score += 20;
    }

    score.min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Vec<CanonicalFeature> {
        let feat = |id: &str, name: &str| CanonicalFeature {
            feature_id: id.to_string(),
            display_name: name.to_string(),
        };
        vec![
            feat("gradebook", "Gradebook"),
            feat("rich-content-editor", "Rich Content Editor"),
            feat("quizzes", "Quizzes"),
            feat("calendar", "Calendar"),
        ]
    }

    #[test]
    fn test_verbatim_name_plus_title_bonus() {
        let suggestions = suggest("Gradebook broke today", "", &features());
        assert_eq!(suggestions[0].feature_id, "gradebook");
        // 50 verbatim + 40 slug + 10 word + 20 title, capped at 100
        assert_eq!(suggestions[0].score, MAX_SCORE);
    }

    #[test]
    fn test_body_only_match_no_title_bonus() {
        let suggestions = suggest("Weird issue", "my quizzes vanished", &features());
        let quizzes = suggestions
            .iter()
            .find(|s| s.feature_id == "quizzes")
            .unwrap();
        // 50 verbatim + 40 slug + 10 word, no title bonus
        assert_eq!(quizzes.score, 100);
    }

    #[test]
    fn test_partial_word_match() {
        let suggestions = suggest("", "the editor feels slow with rich content", &features());
        let rce = suggestions
            .iter()
            .find(|s| s.feature_id == "rich-content-editor")
            .unwrap();
        // No verbatim "rich content editor", no slug, words: rich(10)+content(10)+editor(10)
        assert_eq!(rce.score, 30);
    }

    #[test]
    fn test_top_three_descending() {
        let suggestions = suggest(
            "Gradebook and Quizzes",
            "also Calendar and the Rich Content Editor",
            &features(),
        );
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions[0].score >= suggestions[1].score);
        assert!(suggestions[1].score >= suggestions[2].score);
    }

    #[test]
    fn test_no_overlap_no_suggestions() {
        let suggestions = suggest("hello", "nothing relevant", &features());
        assert!(suggestions.is_empty());
    }
}
