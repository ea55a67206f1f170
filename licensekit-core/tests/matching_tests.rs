//! Matching engine behavior over the regulation fixture.

use licensekit_core::config::MatchingConfig;
use licensekit_core::storage::InMemoryStorage;
use licensekit_core::{
    match_requirements, ArtifactStorage, BusinessProfile, DocumentProcessor, Error, MatchReport,
    MatchingEngine, ParagraphTree, Priority, RuleSet, RulesStore,
};
use licensekit_core::{FeatureMappings, FileStorage};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_fixtures")
}

struct Fixture {
    tree: ParagraphTree,
    mappings: FeatureMappings,
    rules: RuleSet,
    config: MatchingConfig,
}

impl Fixture {
    fn load() -> Self {
        let text = std::fs::read_to_string(fixtures_dir().join("regulation.txt")).unwrap();
        let rules = RuleSet::load_from_file(&fixtures_dir().join("features.json")).unwrap();
        let (tree, mappings) = DocumentProcessor::default().process_text(&text, &rules);
        Self {
            tree,
            mappings,
            rules,
            config: MatchingConfig::default(),
        }
    }

    fn run(&self, profile: &BusinessProfile, min_relevance: Option<f64>) -> MatchReport {
        MatchingEngine::new(&self.tree, &self.mappings, Some(&self.rules), &self.config)
            .match_profile(profile, min_relevance)
    }
}

fn numbers(report: &MatchReport) -> Vec<&str> {
    let mut numbers: Vec<&str> = report
        .matched_requirements
        .iter()
        .map(|m| m.paragraph_number.as_str())
        .collect();
    numbers.sort();
    numbers
}

#[test]
fn test_gas_restaurant_in_range_scores_high() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::from_answers(&json!({
        "size_m2": 120,
        "seats": 50,
        "attributes": ["גז"]
    }));
    let report = fixture.run(&profile, None);

    assert_eq!(report.feature_coverage, vec!["גז", "מ\"ר"]);
    // 1.3 (exact 50), 4.4 (above 500) and 4.5 (80 people) are filtered out
    assert_eq!(numbers(&report), vec!["4.1.2", "4.2", "4.2.1", "4.3"]);

    let ranged = report
        .matched_requirements
        .iter()
        .find(|m| m.paragraph_number == "4.3")
        .unwrap();
    assert_eq!(ranged.relevance_score, 1.0);
    assert_eq!(ranged.priority, Priority::High);
    assert_eq!(ranged.matched_features, vec!["גז", "מ\"ר"]);
    assert_eq!(ranged.numeric_ranges.size_m2.min, Some(100.0));
    assert_eq!(ranged.numeric_ranges.size_m2.max, Some(200.0));

    assert_eq!(report.category("מזון").len(), 4);
    assert!(report.category("הגדרות").is_empty());
}

#[test]
fn test_oversized_business_excluded_by_cap() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::from_answers(&json!({"size_m2": 15000, "attributes": ["בטיחות אש"]}));
    let report = fixture.run(&profile, Some(0.0));

    let found = numbers(&report);
    assert!(!found.contains(&"4.1.2"), "'עד 300 מ\"ר' must exclude 15000");
    assert!(!found.contains(&"4.3"));
    assert!(found.contains(&"4.4"));
}

#[test]
fn test_soft_filter_penalizes_instead_of_dropping() {
    let mut fixture = Fixture::load();
    let profile = BusinessProfile::from_answers(&json!({"size_m2": 15000, "attributes": ["בטיחות אש"]}));
    let filtered = fixture.run(&profile, Some(0.0));

    fixture.config.hard_filter = false;
    let penalized = fixture.run(&profile, Some(0.0));
    assert!(penalized.total_matches > filtered.total_matches);

    // 0.3 base + 0.2 feature + 0.3 safety, then the violation penalty
    let capped = penalized
        .matched_requirements
        .iter()
        .find(|m| m.paragraph_number == "4.1.2")
        .unwrap();
    assert!((capped.relevance_score - 0.8 * 0.2).abs() < 1e-9);
    assert_eq!(capped.priority, Priority::Low);

    let rank = |number: &str| {
        penalized
            .matched_requirements
            .iter()
            .position(|m| m.paragraph_number == number)
            .unwrap()
    };
    assert!(rank("4.4") < rank("4.1.2"));
    assert!(rank("4.4") < rank("4.3"));
    assert_eq!(penalized.matched_requirements[0].relevance_score, 1.0);
}

#[test]
fn test_category_counts_follow_report_order() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::default();
    let report = fixture.run(&profile, Some(0.0));
    assert_eq!(report.category_counts(), vec![("מזון", 4), ("הגדרות", 1)]);
    let total: usize = report.category_counts().iter().map(|(_, n)| n).sum();
    assert_eq!(total, report.total_matches);
}

#[test]
fn test_high_threshold_is_honored() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::new(Some(120.0), Some(50.0), Vec::<String>::new());

    let report = fixture.run(&profile, Some(0.9));
    assert!(report
        .matched_requirements
        .iter()
        .all(|m| m.relevance_score >= 0.9));
    assert_eq!(numbers(&report), vec!["4.1.2", "4.3"]);

    let everything = fixture.run(&profile, Some(0.0));
    assert!(everything.total_matches >= report.total_matches);

    // Out-of-range thresholds clamp to [0, 1]
    assert_eq!(fixture.run(&profile, Some(-3.0)), everything);
    let strict = fixture.run(&profile, Some(7.0));
    assert!(strict.matched_requirements.iter().all(|m| m.relevance_score >= 1.0));
}

#[test]
fn test_scores_and_ranking_invariants() {
    let fixture = Fixture::load();
    let profiles = [
        BusinessProfile::from_answers(&json!({})),
        BusinessProfile::from_answers(&json!({"size_m2": 120, "seats": 50, "attributes": ["גז"]})),
        BusinessProfile::from_answers(&json!({"size_m2": 600, "attributes": ["בטיחות אש", "משלוחים"]})),
    ];

    for profile in &profiles {
        let report = fixture.run(profile, Some(0.0));
        assert_eq!(report.total_matches, report.matched_requirements.len());
        let breakdown = &report.priority_breakdown;
        assert_eq!(breakdown.high + breakdown.medium + breakdown.low, report.total_matches);
        for pair in report.matched_requirements.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        for m in &report.matched_requirements {
            assert!((0.0..=1.0).contains(&m.relevance_score));
            assert!(!m.text.is_empty());
        }
    }
}

#[test]
fn test_missing_data_is_not_a_constraint() {
    let fixture = Fixture::load();
    let report = fixture.run(&BusinessProfile::default(), Some(0.0));
    // Only the size feature applies; nothing is filtered without profile data
    assert_eq!(report.feature_coverage, vec!["מ\"ר"]);
    assert_eq!(numbers(&report), vec!["1.3", "4.1.2", "4.3", "4.4", "4.5"]);
}

#[test]
fn test_matching_is_deterministic() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::from_answers(&json!({"size_m2": 120, "seats": 50, "attributes": ["גז"]}));
    let first = serde_json::to_value(fixture.run(&profile, None)).unwrap();
    let second = serde_json::to_value(fixture.run(&profile, None)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_report_wire_contract() {
    let fixture = Fixture::load();
    let profile = BusinessProfile::from_answers(&json!({"size_m2": 120, "seats": 50, "attributes": ["גז"]}));
    let value = serde_json::to_value(fixture.run(&profile, None)).unwrap();

    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec![
            "matched_requirements",
            "by_category",
            "feature_coverage",
            "total_matches",
            "priority_breakdown",
            "avg_relevance"
        ]
    );
    assert!(value["by_category"]["מזון"].is_array());
    assert_eq!(value["total_matches"], json!(4));

    let first = &value["matched_requirements"][0];
    let match_keys: Vec<&String> = first.as_object().unwrap().keys().collect();
    assert_eq!(
        match_keys,
        vec![
            "category",
            "paragraph_number",
            "text",
            "relevance_score",
            "matched_features",
            "numeric_ranges",
            "priority"
        ]
    );
    assert!(matches!(first["priority"].as_str(), Some("high" | "medium" | "low")));
    assert!(first["numeric_ranges"]["size_m2"].is_object());
    assert!(first["numeric_ranges"]["occupancy"]["exact"].is_array());
}

#[test]
fn test_store_backed_matching() {
    let fixture = Fixture::load();
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    storage
        .write("paragraphs.json", &serde_json::to_string(&fixture.tree).unwrap())
        .unwrap();
    storage
        .write("mappings.json", &serde_json::to_string(&fixture.mappings).unwrap())
        .unwrap();

    let profile = BusinessProfile::from_answers(&json!({"size_m2": 120, "seats": 50, "attributes": ["גז"]}));

    // Without a rule file, applicability is decided from feature names alone
    let store = RulesStore::from_dir(dir.path());
    let bare = match_requirements(&store, &profile, &fixture.config, None).unwrap();
    assert_eq!(bare.feature_coverage, vec!["בטיחות אש", "גז", "מ\"ר"]);

    let with_rules = RulesStore::from_dir(dir.path()).with_rules_file(fixtures_dir().join("features.json"));
    let report = match_requirements(&with_rules, &profile, &fixture.config, None).unwrap();
    assert_eq!(report, fixture.run(&profile, None));
    assert_eq!(with_rules.load_count(), 1);
}

#[test]
fn test_unloadable_store_is_fatal() {
    let store = RulesStore::new(Arc::new(InMemoryStorage::new()));
    let err = match_requirements(
        &store,
        &BusinessProfile::default(),
        &MatchingConfig::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, Error::DataUnavailable(_)));

    let storage: Value = json!({"not": "a tree"});
    let broken = InMemoryStorage::new()
        .with_artifact("paragraphs.json", &storage.to_string())
        .with_artifact("mappings.json", "[]");
    let store = RulesStore::new(Arc::new(broken));
    assert!(store.load().is_err());
}
