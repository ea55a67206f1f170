use super::profile::BusinessProfile;
use super::ranges::{extract_numeric_ranges, NumericRanges};
use super::scoring::{score_paragraph, violates, Priority};
use crate::config::MatchingConfig;
use crate::error::Result;
use crate::features::{FeatureRule, RuleSet};
use crate::store::RulesStore;
use crate::types::{compare_segments, FeatureMappings, ParagraphTree};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

const SIZE_MARKERS: [&str; 4] = ["מ\"ר", "מ״ר", "שטח", "size"];
const OCCUPANCY_MARKERS: [&str; 4] = ["תפוסה", "איש", "seats", "seating"];
const GENERAL_MARKERS: [&str; 6] = ["בטיחות", "כיבוי", "safety", "fire", "כללי", "general"];

/// How a feature name decides its own applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureClass {
    /// Every business has a size
    Size,
    /// Every business has an occupancy
    Occupancy,
    /// General or safety content outside the rule set
    General,
    /// Applies only when the profile lists it
    Selectable,
}

pub fn classify_feature(name: &str, rules: Option<&RuleSet>) -> FeatureClass {
    let lowered = name.to_lowercase();
    if SIZE_MARKERS.iter().any(|m| lowered.contains(m)) {
        FeatureClass::Size
    } else if OCCUPANCY_MARKERS.iter().any(|m| lowered.contains(m)) {
        FeatureClass::Occupancy
    } else if rules.is_some_and(|r| r.contains(name)) {
        FeatureClass::Selectable
    } else if GENERAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        FeatureClass::General
    } else {
        FeatureClass::Selectable
    }
}

/// One applicable paragraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub category: String,
    pub paragraph_number: String,
    pub text: String,
    pub relevance_score: f64,
    pub matched_features: Vec<String>,
    pub numeric_ranges: NumericRanges,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Ranked result of one matching call. Field names are a wire contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchReport {
    pub matched_requirements: Vec<Match>,
    #[serde(serialize_with = "serialize_by_category")]
    pub by_category: Vec<(String, Vec<Match>)>,
    pub feature_coverage: Vec<String>,
    pub total_matches: usize,
    pub priority_breakdown: PriorityBreakdown,
    pub avg_relevance: f64,
}

impl MatchReport {
    fn from_ranked(matches: Vec<Match>, feature_coverage: Vec<String>) -> Self {
        let mut by_category: Vec<(String, Vec<Match>)> = Vec::new();
        let mut breakdown = PriorityBreakdown::default();
        for m in &matches {
            match m.priority {
                Priority::High => breakdown.high += 1,
                Priority::Medium => breakdown.medium += 1,
                Priority::Low => breakdown.low += 1,
            }
            match by_category.iter_mut().find(|(name, _)| *name == m.category) {
                Some((_, group)) => group.push(m.clone()),
                None => by_category.push((m.category.clone(), vec![m.clone()])),
            }
        }

        let avg_relevance = if matches.is_empty() {
            0.0
        } else {
            matches.iter().map(|m| m.relevance_score).sum::<f64>() / matches.len() as f64
        };

        Self {
            total_matches: matches.len(),
            matched_requirements: matches,
            by_category,
            feature_coverage,
            priority_breakdown: breakdown,
            avg_relevance,
        }
    }

    /// Matches per category, in report order.
    pub fn category_counts(&self) -> Vec<(&str, usize)> {
        self.by_category
            .iter()
            .map(|(name, group)| (name.as_str(), group.len()))
            .collect()
    }

    pub fn category(&self, name: &str) -> &[Match] {
        self.by_category
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, group)| group.as_slice())
            .unwrap_or(&[])
    }
}

fn serialize_by_category<S: Serializer>(
    groups: &[(String, Vec<Match>)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(groups.len()))?;
    for (category, matches) in groups {
        map.serialize_entry(category, matches)?;
    }
    map.end()
}

struct Candidate<'a> {
    category_index: usize,
    category: &'a str,
    number: &'a str,
    text: &'a str,
    features: Vec<String>,
}

/// Stateless matcher over one set of loaded artifacts.
pub struct MatchingEngine<'a> {
    tree: &'a ParagraphTree,
    mappings: &'a FeatureMappings,
    rules: Option<&'a RuleSet>,
    config: &'a MatchingConfig,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(
        tree: &'a ParagraphTree,
        mappings: &'a FeatureMappings,
        rules: Option<&'a RuleSet>,
        config: &'a MatchingConfig,
    ) -> Self {
        Self {
            tree,
            mappings,
            rules,
            config,
        }
    }

    /// Mapped features that apply to this profile, sorted.
    pub fn applicable_features(&self, profile: &BusinessProfile) -> Vec<String> {
        let mut features: Vec<String> = self
            .mappings
            .names()
            .filter(|name| match classify_feature(name, self.rules) {
                FeatureClass::Size | FeatureClass::Occupancy | FeatureClass::General => true,
                FeatureClass::Selectable => profile.has_attribute(name),
            })
            .map(str::to_string)
            .collect();
        features.sort();
        features
    }

    /// `min_relevance` defaults to the configured threshold and is clamped to [0, 1].
    pub fn match_profile(&self, profile: &BusinessProfile, min_relevance: Option<f64>) -> MatchReport {
        let threshold = min_relevance
            .filter(|v| !v.is_nan())
            .unwrap_or(self.config.min_relevance)
            .clamp(0.0, 1.0);

        let coverage = self.applicable_features(profile);
        let selected = self.selected_rules(profile);
        let candidates = self.collect_candidates(&coverage);
        debug!(
            "{} applicable features, {} candidate paragraphs",
            coverage.len(),
            candidates.len()
        );

        let mut scored: Vec<(usize, Match)> = Vec::new();
        for candidate in candidates {
            let ranges = extract_numeric_ranges(candidate.text);
            if self.config.hard_filter && violates(profile, &ranges, self.config) {
                debug!(
                    "Dropping {}/{}: numeric constraint excludes profile",
                    candidate.category, candidate.number
                );
                continue;
            }
            let score = score_paragraph(candidate.text, &ranges, profile, &selected, self.config);
            if score < threshold {
                continue;
            }
            scored.push((
                candidate.category_index,
                Match {
                    category: candidate.category.to_string(),
                    paragraph_number: candidate.number.to_string(),
                    text: candidate.text.to_string(),
                    relevance_score: score,
                    matched_features: candidate.features,
                    numeric_ranges: ranges,
                    priority: Priority::from_score(score, self.config),
                },
            ));
        }

        scored.sort_by(|(cat_a, a), (cat_b, b)| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| cat_a.cmp(cat_b))
                .then_with(|| compare_segments(&a.paragraph_number, &b.paragraph_number))
        });

        let matches = scored.into_iter().map(|(_, m)| m).collect();
        MatchReport::from_ranked(matches, coverage)
    }

    fn selected_rules(&self, profile: &BusinessProfile) -> Vec<&'a FeatureRule> {
        let Some(rules) = self.rules else {
            return Vec::new();
        };
        rules
            .rules
            .iter()
            .filter(|rule| classify_feature(&rule.name, Some(rules)) == FeatureClass::Selectable)
            .filter(|rule| profile.has_attribute(&rule.name))
            .collect()
    }

    fn collect_candidates(&self, coverage: &[String]) -> Vec<Candidate<'a>> {
        let tree: &'a ParagraphTree = self.tree;
        let mut candidates: Vec<Candidate<'a>> = Vec::new();
        let mut seen: HashMap<(usize, &'a str), usize> = HashMap::new();

        for feature in coverage {
            let Some(mapping) = self.mappings.get(feature) else {
                continue;
            };
            for (category_key, numbers) in &mapping.categories {
                let Some(category_index) = tree
                    .categories
                    .iter()
                    .position(|c| c.name == *category_key)
                    .or_else(|| tree.categories.iter().position(|c| c.answers_to(category_key)))
                else {
                    debug!("Mapping for '{}' names unknown category '{}'", feature, category_key);
                    continue;
                };
                let category = &tree.categories[category_index];

                for number in numbers {
                    let Some(paragraph) = category.paragraph(number) else {
                        continue;
                    };
                    if paragraph.text.trim().is_empty() {
                        continue;
                    }
                    let key = (category_index, paragraph.number.as_str());
                    match seen.get(&key) {
                        Some(&idx) => {
                            let features = &mut candidates[idx].features;
                            if !features.contains(feature) {
                                features.push(feature.clone());
                            }
                        }
                        None => {
                            seen.insert(key, candidates.len());
                            candidates.push(Candidate {
                                category_index,
                                category: &category.name,
                                number: &paragraph.number,
                                text: &paragraph.text,
                                features: vec![feature.clone()],
                            });
                        }
                    }
                }
            }
        }
        candidates
    }
}

/// Match a profile against the artifacts held by `store`.
///
/// The only failure is the store being unable to load.
pub fn match_requirements(
    store: &RulesStore,
    profile: &BusinessProfile,
    config: &MatchingConfig,
    min_relevance: Option<f64>,
) -> Result<MatchReport> {
    let loaded = store.load()?;
    let engine = MatchingEngine::new(&loaded.tree, &loaded.mappings, loaded.rules.as_ref(), config);
    Ok(engine.match_profile(profile, min_relevance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_classes() {
        let rules = RuleSet::from_value(&serde_json::json!({
            "גז": {"keywords": ["גז"]},
            "בטיחות מזון": {"keywords": ["מזון"]}
        }))
        .unwrap();
        assert_eq!(classify_feature("מ\"ר", Some(&rules)), FeatureClass::Size);
        assert_eq!(classify_feature("תפוסה", Some(&rules)), FeatureClass::Occupancy);
        assert_eq!(classify_feature("גז", Some(&rules)), FeatureClass::Selectable);
        assert_eq!(classify_feature("בטיחות מזון", Some(&rules)), FeatureClass::Selectable);
        assert_eq!(classify_feature("בטיחות אש", Some(&rules)), FeatureClass::General);
        assert_eq!(classify_feature("משלוחים", None), FeatureClass::Selectable);
    }

    #[test]
    fn test_empty_report_is_zero_filled() {
        let report = MatchReport::from_ranked(Vec::new(), Vec::new());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "matched_requirements": [],
                "by_category": {},
                "feature_coverage": [],
                "total_matches": 0,
                "priority_breakdown": {"high": 0, "medium": 0, "low": 0},
                "avg_relevance": 0.0
            })
        );
    }
}
