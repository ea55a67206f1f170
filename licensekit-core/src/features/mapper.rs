use super::rule::{FeatureRule, Keyword, RuleSet, Scope};
use crate::types::{sorted_unique_numbers, CategoryTree, FeatureMapping, FeatureMappings, ParagraphTree};
use tracing::{debug, info};

/// Select, for every rule, the paragraphs whose text hits one of its keywords.
///
/// Each paragraph is tested on its own text only; a matching parent doesn't
/// pull in its children. Category keys in the result are the tree's category
/// names, even when the rule addressed a category by chapter number.
pub fn map_features(tree: &ParagraphTree, rules: &RuleSet) -> FeatureMappings {
    let mut mappings = FeatureMappings::new();
    for rule in &rules.rules {
        let mapping = map_rule(tree, rule);
        debug!(
            "Feature '{}' selected {} paragraphs",
            rule.name,
            mapping.paragraphs.len()
        );
        mappings.features.push((rule.name.clone(), mapping));
    }
    info!(
        "Mapped {} features over {} categories",
        mappings.len(),
        tree.categories.len()
    );
    mappings
}

pub fn map_rule(tree: &ParagraphTree, rule: &FeatureRule) -> FeatureMapping {
    let mut hits: Vec<(String, Vec<String>)> = Vec::new();

    match &rule.scope {
        Scope::Category(name) => match tree.category(name) {
            Some(category) => record(&mut hits, category, scan(category, &rule.keywords)),
            None => debug!("Feature '{}' targets unknown category '{}'", rule.name, name),
        },
        Scope::PerCategory(entries) => {
            for (name, scoped) in entries {
                let Some(category) = tree.category(name) else {
                    debug!("Feature '{}' targets unknown category '{}'", rule.name, name);
                    continue;
                };
                let keywords: Vec<Keyword> = scoped.iter().chain(&rule.keywords).cloned().collect();
                record(&mut hits, category, scan(category, &keywords));
            }
        }
        Scope::AllCategories => {
            for category in &tree.categories {
                record(&mut hits, category, scan(category, &rule.keywords));
            }
        }
    }

    let paragraphs = sorted_unique_numbers(hits.iter().flat_map(|(_, n)| n.iter().cloned()));
    FeatureMapping {
        categories: hits,
        paragraphs,
    }
}

fn scan(category: &CategoryTree, keywords: &[Keyword]) -> Vec<String> {
    category
        .paragraphs()
        .filter(|p| keywords.iter().any(|k| k.is_match(&p.text)))
        .map(|p| p.number.clone())
        .collect()
}

/// Merge hits into the per-category list; categories without hits are left out.
fn record(hits: &mut Vec<(String, Vec<String>)>, category: &CategoryTree, numbers: Vec<String>) {
    if numbers.is_empty() {
        return;
    }
    match hits.iter_mut().find(|(name, _)| *name == category.name) {
        Some((_, existing)) => {
            let mut merged = std::mem::take(existing);
            merged.extend(numbers);
            *existing = sorted_unique_numbers(merged);
        }
        None => hits.push((category.name.clone(), sorted_unique_numbers(numbers))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn sample_tree() -> ParagraphTree {
        parse(
            "פרק 4 - משרד הבריאות\n1 מטבח\n1.1 כיריים גז\n1.2 מקרר לבשר\nפרק 5 - כבאות\n1 מערכת גז מרכזית\n1.1 שטח של 120 מ\"ר\n2 120מ\"ר נוספים",
        )
    }

    #[test]
    fn test_paragraphs_match_independently() {
        let rules = RuleSet::from_value(&json!({"גז": {"keywords": ["גז"]}})).unwrap();
        let mappings = map_features(&sample_tree(), &rules);
        let gas = mappings.get("גז").unwrap();
        assert_eq!(gas.numbers_in("משרד הבריאות"), &["4.1.1".to_string()]);
        assert_eq!(gas.numbers_in("כבאות"), &["5.1".to_string()]);
        assert_eq!(gas.paragraphs, vec!["4.1.1", "5.1"]);
    }

    #[test]
    fn test_regex_feature_across_every_category() {
        let rules = RuleSet::from_value(&json!({
            "מ\"ר": {
                "search_all_categories": true,
                "keywords": [{"regex": true, "pattern": "[0-9]+\\s*מ\"ר"}]
            }
        }))
        .unwrap();
        let mappings = map_features(&sample_tree(), &rules);
        let size = mappings.get("מ\"ר").unwrap();
        assert_eq!(size.numbers_in("כבאות"), &["5.2".to_string(), "5.1.1".to_string()]);
        assert!(size.numbers_in("משרד הבריאות").is_empty());
    }

    #[test]
    fn test_single_and_per_category_scopes() {
        let rules = RuleSet::from_value(&json!({
            "בשר": {"category": "4", "keywords": ["בשר"]},
            "מטבח": {"categories": {"משרד הבריאות": ["מטבח"], "לא קיים": ["x"]}, "keywords": ["גז"]},
            "חסר": {"category": "משטרה", "keywords": ["גז"]}
        }))
        .unwrap();
        let mappings = map_features(&sample_tree(), &rules);

        let meat = mappings.get("בשר").unwrap();
        assert_eq!(meat.categories.len(), 1);
        assert_eq!(meat.numbers_in("משרד הבריאות"), &["4.1.2".to_string()]);

        let kitchen = mappings.get("מטבח").unwrap();
        assert_eq!(kitchen.paragraphs, vec!["4.1", "4.1.1"]);
        assert!(kitchen.numbers_in("כבאות").is_empty());

        assert!(mappings.get("חסר").unwrap().is_empty());
        assert_eq!(mappings.names().collect::<Vec<_>>(), vec!["בשר", "מטבח", "חסר"]);
    }
}
