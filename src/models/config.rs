//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ContentKind;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and fetching behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Classification backend settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// First-run emission limits per content kind
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Text preprocessing settings
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Content source definitions
    #[serde(default)]
    pub sources: Vec<SourcePattern>,

    /// Seed feature catalog
    #[serde(default = "defaults::default_catalog")]
    pub catalog: Vec<FeatureSeed>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.classifier.max_input_chars == 0 {
            return Err(AppError::validation(
                "classifier.max_input_chars must be > 0",
            ));
        }
        if self.catalog.is_empty() {
            return Err(AppError::validation("No catalog features defined"));
        }
        if !self
            .catalog
            .iter()
            .any(|f| f.id == crate::models::GENERAL_FEATURE_ID)
        {
            return Err(AppError::validation(
                "Catalog must include the 'general' catch-all feature",
            ));
        }
        for source in &self.sources {
            if source.url.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "Source '{}' has an empty url",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
            limits: LimitsConfig::default(),
            cleaning: CleaningConfig::default(),
            sources: Vec::new(),
            catalog: defaults::default_catalog(),
        }
    }
}

/// HTTP client and fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Classification backend settings.
///
/// The backend is optional; with no endpoint configured the resolver
/// skips the fallback tier entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Backend endpoint URL; None disables the fallback tier
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier passed to the backend
    #[serde(default = "defaults::classifier_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::classifier_timeout")]
    pub timeout_secs: u64,

    /// Maximum input length in characters
    #[serde(default = "defaults::max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: defaults::classifier_model(),
            timeout_secs: defaults::classifier_timeout(),
            max_input_chars: defaults::max_input_chars(),
        }
    }
}

/// First-run emission limits, applied independently per content kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "defaults::first_run_bulletins")]
    pub first_run_bulletins: usize,

    #[serde(default = "defaults::first_run_questions")]
    pub first_run_questions: usize,

    #[serde(default = "defaults::first_run_blogs")]
    pub first_run_blogs: usize,
}

impl LimitsConfig {
    /// First-run emission cap for the given content kind.
    pub fn first_run_limit(&self, kind: ContentKind) -> usize {
        match kind {
            ContentKind::Bulletin => self.first_run_bulletins,
            ContentKind::Question => self.first_run_questions,
            ContentKind::Blog => self.first_run_blogs,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            first_run_bulletins: defaults::first_run_bulletins(),
            first_run_questions: defaults::first_run_questions(),
            first_run_blogs: defaults::first_run_blogs(),
        }
    }
}

/// Text cleaning/preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CleaningConfig {
    /// Patterns to remove from titles
    #[serde(default)]
    pub title_remove_patterns: Vec<String>,
}

impl CleaningConfig {
    /// Clean a title string.
    pub fn clean_title(&self, text: &str) -> String {
        let mut result = Self::normalize_whitespace(text);
        for pattern in &self.title_remove_patterns {
            result = result.replace(pattern, "");
        }
        result.trim().to_string()
    }

    fn normalize_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// A content source with the selectors needed to scrape it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePattern {
    /// Source name for identification
    pub name: String,

    /// Content kind produced by this source
    pub kind: ContentKind,

    /// Listing page URL
    pub url: String,

    /// CSS selector for item rows on the listing page
    pub item_selector: String,

    /// CSS selector for the title element within a row
    pub title_selector: String,

    /// CSS selector for the link element (defaults to the title element)
    #[serde(default)]
    pub link_selector: Option<String>,

    /// CSS selector for the body element on the detail page
    #[serde(default)]
    pub body_selector: Option<String>,

    /// CSS selector for the reply/comment count element
    #[serde(default)]
    pub reply_count_selector: Option<String>,

    /// CSS selector for reply rows on the detail page
    #[serde(default)]
    pub comment_selector: Option<String>,

    /// CSS selector for the reply text within a row (defaults to the
    /// whole row)
    #[serde(default)]
    pub comment_body_selector: Option<String>,

    /// HTML attribute for link extraction
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,
}

/// One seed entry of the canonical feature catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSeed {
    /// Stable feature identifier
    pub id: String,

    /// Human-readable display name
    pub display_name: String,
}

mod defaults {
    use super::FeatureSeed;

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; featwatch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        5
    }

    // Classifier defaults
    pub fn classifier_model() -> String {
        "gpt-4o-mini".into()
    }
    pub fn classifier_timeout() -> u64 {
        20
    }
    pub fn max_input_chars() -> usize {
        1500
    }

    // First-run limit defaults
    pub fn first_run_bulletins() -> usize {
        10
    }
    pub fn first_run_questions() -> usize {
        25
    }
    pub fn first_run_blogs() -> usize {
        10
    }

    // Source defaults
    pub fn link_attr() -> String {
        "href".into()
    }

    // Catalog defaults
    pub fn default_catalog() -> Vec<FeatureSeed> {
        let seed = |id: &str, name: &str| FeatureSeed {
            id: id.to_string(),
            display_name: name.to_string(),
        };
        vec![
            seed("general", "General"),
            seed("gradebook", "Gradebook"),
            seed("assignments", "Assignments"),
            seed("quizzes", "Quizzes"),
            seed("discussions", "Discussions"),
            seed("speedgrader", "SpeedGrader"),
            seed("calendar", "Calendar"),
            seed("rich-content-editor", "Rich Content Editor"),
            seed("dashboard", "Dashboard"),
            seed("notifications", "Notifications"),
            seed("mobile", "Mobile"),
            seed("api", "API"),
        ]
    }
}
