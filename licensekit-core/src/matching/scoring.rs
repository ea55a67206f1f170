use super::profile::BusinessProfile;
use super::ranges::{NumericRange, NumericRanges};
use crate::config::MatchingConfig;
use crate::features::FeatureRule;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_score(score: f64, config: &MatchingConfig) -> Self {
        if score >= config.high_threshold {
            Priority::High
        } else if score >= config.medium_threshold {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// True when the profile has data for a dimension the paragraph constrains
/// and that data falls outside the constraint.
pub fn violates(profile: &BusinessProfile, ranges: &NumericRanges, config: &MatchingConfig) -> bool {
    let ratio = config.exact_tolerance_ratio;
    let outside = |value: Option<f64>, range: &NumericRange| {
        value.is_some_and(|v| range.is_constrained() && !range.admits(v, ratio))
    };
    outside(profile.size_m2, &ranges.size_m2) || outside(profile.seats_value(), &ranges.occupancy)
}

/// Relevance of one paragraph to a profile, in [0, 1].
///
/// `selected` holds the user-selected rules (size and occupancy features
/// excluded); each one whose keywords hit `text` adds the feature bonus.
pub fn score_paragraph(
    text: &str,
    ranges: &NumericRanges,
    profile: &BusinessProfile,
    selected: &[&FeatureRule],
    config: &MatchingConfig,
) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score = config.base_score;
    score += dimension_bonus(profile.size_m2, &ranges.size_m2, config);
    score += dimension_bonus(profile.seats_value(), &ranges.occupancy, config);

    let hits = selected.iter().filter(|rule| rule.matches_text(text)).count();
    score += config.feature_bonus * hits as f64;

    if contains_any_term(text, &config.safety_terms) {
        score += config.safety_bonus;
    }
    if profile.serves_meat && contains_any_term(text, &config.meat_terms) {
        score += config.meat_bonus;
    }

    score = score.min(1.0);
    if violates(profile, ranges, config) {
        score *= config.violation_penalty;
    }
    score.clamp(0.0, 1.0)
}

fn dimension_bonus(value: Option<f64>, range: &NumericRange, config: &MatchingConfig) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    if range.has_bounds() && range.bounds_hold(value) {
        config.range_bonus
    } else if range.exact_within(value, config.exact_tolerance_ratio) {
        config.exact_bonus
    } else {
        0.0
    }
}

/// Case-insensitive substring test against a configured term list.
pub fn contains_any_term(text: &str, terms: &[String]) -> bool {
    let lowered = text.to_lowercase();
    terms
        .iter()
        .any(|term| lowered.contains(&term.to_lowercase()))
}
