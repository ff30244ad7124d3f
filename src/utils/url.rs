// src/utils/url.rs

//! URL manipulation and source-id derivation.

use sha2::{Digest, Sha256};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Derive a stable source identifier from an item URL.
///
/// Identity comes from the origin, not from a content hash, so it
/// survives re-fetches of the same item. Preference order: a keyed query
/// parameter, then trailing path digits, then a digest of the full URL.
pub fn extract_source_id(link: &str) -> String {
    let domain = get_domain(link).unwrap_or_default();

    if let Some(id) = extract_keyed_id(link) {
        if domain.is_empty() {
            return id;
        }
        return format!("{domain}:{id}");
    }

    // Last resort: digest the whole URL
    let digest = Sha256::digest(link.as_bytes());
    format!("sha:{}", &hex::encode(digest)[..16])
}

fn extract_keyed_id(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let mut fallback_keyed: Option<String> = None;
    let mut fallback_numeric: Option<String> = None;

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }

        let key_lower = key.to_lowercase();
        let value_string = value.to_string();

        if matches!(
            key_lower.as_str(),
            "id" | "post_id" | "postid" | "article_id" | "articleid" | "topic_id" | "seq" | "no"
        ) {
            return Some(value_string);
        }

        if fallback_keyed.is_none()
            && (key_lower.contains("id") || key_lower.contains("no") || key_lower.contains("seq"))
        {
            fallback_keyed = Some(value_string.clone());
        }

        if fallback_numeric.is_none() && value_string.chars().all(|c| c.is_ascii_digit()) {
            fallback_numeric = Some(value_string);
        }
    }

    if fallback_keyed.is_some() {
        return fallback_keyed;
    }
    if fallback_numeric.is_some() {
        return fallback_numeric;
    }

    // Trailing path segment with digits, e.g. /td-p/612847
    let last = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())?;
    let digits: String = last.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { Some(digits) }
}
