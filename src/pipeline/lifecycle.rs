// src/pipeline/lifecycle.rs

//! Lifecycle tracking and status text derivation.
//!
//! The status sentence is a pure template over the structured fields.
//! Same inputs, same bytes out; no free-text generation.

use chrono::NaiveDate;

use crate::models::{FeatureOption, LifecycleStatus};

/// Partial update to a feature option, driven by newly parsed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionUpdate {
    pub status: Option<LifecycleStatus>,
    pub config_level: Option<String>,
    pub beta_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub deprecation_date: Option<NaiveDate>,
    pub first_announced: Option<NaiveDate>,
}

impl OptionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply an update and recompute the derived status text. Returns
/// whether anything actually changed.
pub fn apply_update(option: &mut FeatureOption, update: &OptionUpdate, today: NaiveDate) -> bool {
    let before = option.clone();

    if let Some(status) = update.status {
        option.status = status;
    }
    if let Some(level) = &update.config_level {
        option.config_level = Some(level.clone());
    }
    if let Some(date) = update.beta_date {
        option.beta_date = Some(date);
    }
    if let Some(date) = update.production_date {
        option.production_date = Some(date);
    }
    if let Some(date) = update.deprecation_date {
        option.deprecation_date = Some(date);
    }
    if let Some(date) = update.first_announced {
        option.first_announced = Some(date);
    }

    option.status_text = derive_status(option, today);
    *option != before
}

/// Derive the human-readable status sentence from structured fields.
pub fn derive_status(option: &FeatureOption, today: NaiveDate) -> String {
    let mut segments: Vec<String> = Vec::new();

    segments.push(status_phrase(option.status).to_string());

    if let Some(level) = &option.config_level {
        segments.push(format!("{level}-level setting"));
    }

    if let Some(date) = option.beta_date {
        if date > today {
            segments.push(format!("In beta starting {}", long_date(date)));
        } else {
            segments.push(format!("In beta since {}", month_year(date)));
        }
    }

    if let Some(date) = option.production_date {
        if date > today {
            segments.push(format!("In production starting {}", long_date(date)));
        } else {
            segments.push(format!("In production since {}", month_year(date)));
        }
    }

    if let Some(date) = option.deprecation_date {
        if date > today {
            segments.push(format!("Deprecation scheduled for {}", long_date(date)));
        } else {
            segments.push(format!("Deprecated since {}", month_year(date)));
        }
    }

    if option.beta_date.is_none() && option.production_date.is_none() {
        if let Some(date) = option.first_announced {
            segments.push(format!("First announced {}", month_year(date)));
        }
    }

    let mut sentence = segments.join(". ");
    sentence.push('.');
    sentence
}

fn status_phrase(status: LifecycleStatus) -> &'static str {
    match status {
        LifecycleStatus::Pending => "Not yet available",
        LifecycleStatus::Preview => "In feature preview (beta)",
        LifecycleStatus::Optional => "Available, disabled by default",
        LifecycleStatus::DefaultOn => "Available, enabled by default",
        LifecycleStatus::Released => "Fully released",
        LifecycleStatus::Deprecated => "Deprecated",
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn month_year(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureOption;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn option() -> FeatureOption {
        FeatureOption::new("grade-override", "gradebook", "Final Grade Override")
    }

    #[test]
    fn test_pending_with_first_announced() {
        let mut opt = option();
        opt.first_announced = Some(ymd(2026, 7, 18));

        let text = derive_status(&opt, ymd(2026, 8, 1));
        assert_eq!(text, "Not yet available. First announced July 2026.");
    }

    #[test]
    fn test_preview_with_future_beta() {
        let mut opt = option();
        opt.status = LifecycleStatus::Preview;
        opt.config_level = Some("Account".to_string());
        opt.beta_date = Some(ymd(2026, 9, 5));

        let text = derive_status(&opt, ymd(2026, 8, 1));
        assert_eq!(
            text,
            "In feature preview (beta). Account-level setting. In beta starting September 5, 2026."
        );
    }

    #[test]
    fn test_past_beta_and_production() {
        let mut opt = option();
        opt.status = LifecycleStatus::DefaultOn;
        opt.beta_date = Some(ymd(2026, 5, 2));
        opt.production_date = Some(ymd(2026, 6, 20));

        let text = derive_status(&opt, ymd(2026, 8, 1));
        assert_eq!(
            text,
            "Available, enabled by default. In beta since May 2026. In production since June 2026."
        );
    }

    #[test]
    fn test_first_announced_suppressed_by_rollout_dates() {
        let mut opt = option();
        opt.beta_date = Some(ymd(2026, 5, 2));
        opt.first_announced = Some(ymd(2026, 4, 1));

        let text = derive_status(&opt, ymd(2026, 8, 1));
        assert!(!text.contains("First announced"));
    }

    #[test]
    fn test_deprecation_scheduled() {
        let mut opt = option();
        opt.status = LifecycleStatus::Deprecated;
        opt.deprecation_date = Some(ymd(2027, 6, 30));

        let text = derive_status(&opt, ymd(2026, 8, 1));
        assert_eq!(text, "Deprecated. Deprecation scheduled for June 30, 2027.");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let mut opt = option();
        opt.status = LifecycleStatus::Optional;
        opt.config_level = Some("Account".to_string());
        opt.beta_date = Some(ymd(2026, 5, 2));

        let today = ymd(2026, 8, 1);
        assert_eq!(derive_status(&opt, today), derive_status(&opt, today));
    }

    #[test]
    fn test_apply_update_reports_change() {
        let mut opt = option();
        let today = ymd(2026, 8, 1);

        let update = OptionUpdate {
            status: Some(LifecycleStatus::Preview),
            beta_date: Some(ymd(2026, 7, 4)),
            ..OptionUpdate::default()
        };
        assert!(apply_update(&mut opt, &update, today));
        assert_eq!(opt.status, LifecycleStatus::Preview);
        assert!(opt.status_text.contains("In beta since July 2026"));

        // Re-applying the same update changes nothing
        assert!(!apply_update(&mut opt, &update, today));
    }
}
