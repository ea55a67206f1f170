use crate::error::{Error, Result};
use crate::types::CategoryTree;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    /// Case-insensitive substring
    Literal,
    Pattern,
}

/// One compiled keyword of a feature rule.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub kind: KeywordKind,
    pub source: String,
    regex: Regex,
}

impl Keyword {
    pub fn literal(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::configuration(text, "empty keyword"));
        }
        let regex = RegexBuilder::new(&regex::escape(text))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::configuration(text, e.to_string()))?;
        Ok(Self {
            kind: KeywordKind::Literal,
            source: text.to_string(),
            regex,
        })
    }

    /// Flags follow the `I|M|S|U|X` letters; unknown letters are ignored and an
    /// empty effective set means case-insensitive.
    pub fn pattern(pattern: &str, flags: &[String]) -> Result<Self> {
        let mut builder = RegexBuilder::new(pattern);
        let mut any = false;
        for flag in flags {
            match flag.to_ascii_uppercase().as_str() {
                "I" | "IGNORECASE" => builder.case_insensitive(true),
                "M" | "MULTILINE" => builder.multi_line(true),
                "S" | "DOTALL" => builder.dot_matches_new_line(true),
                "U" | "UNICODE" => builder.unicode(true),
                "X" | "VERBOSE" => builder.ignore_whitespace(true),
                other => {
                    warn!("Ignoring unknown regex flag '{}' on /{}/", other, pattern);
                    continue;
                }
            };
            any = true;
        }
        if !any {
            builder.case_insensitive(true);
        }
        let regex = builder
            .build()
            .map_err(|e| Error::configuration(pattern, e.to_string()))?;
        Ok(Self {
            kind: KeywordKind::Pattern,
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn from_value(rule: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Self::literal(text),
            Value::Object(object) if object.get("regex") == Some(&Value::Bool(true)) => {
                let pattern = object.get("pattern").and_then(Value::as_str).ok_or_else(|| {
                    Error::configuration(rule, "regex keyword without a string pattern")
                })?;
                let flags = match object.get("flags") {
                    None | Some(Value::Null) => vec!["I".to_string()],
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    Some(Value::String(single)) => vec![single.clone()],
                    Some(_) => {
                        return Err(Error::configuration(rule, "regex flags must be a list"))
                    }
                };
                Self::pattern(pattern, &flags).map_err(|e| match e {
                    Error::Configuration { reason, .. } => Error::configuration(
                        rule,
                        format!("invalid pattern /{pattern}/: {reason}"),
                    ),
                    other => other,
                })
            }
            other => Err(Error::configuration(
                rule,
                format!("unsupported keyword {other}"),
            )),
        }
    }
}

/// Which categories a rule scans.
#[derive(Debug, Clone)]
pub enum Scope {
    /// One named category, all depths
    Category(String),
    /// Each named category with its own keywords plus the rule's shared ones
    PerCategory(Vec<(String, Vec<Keyword>)>),
    AllCategories,
}

#[derive(Debug, Clone)]
pub struct FeatureRule {
    pub name: String,
    /// Shared keywords; for per-category scopes these apply in every listed category
    pub keywords: Vec<Keyword>,
    pub scope: Scope,
}

impl FeatureRule {
    /// Decode one entry of the rule file.
    pub fn from_value(name: &str, value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::configuration(name, "rule must be an object"))?;

        let keywords = match object.get("keywords") {
            Some(items) => keyword_list(name, items)?,
            None => Vec::new(),
        };

        let scope = if let Some(categories) = object.get("categories") {
            let categories = categories
                .as_object()
                .ok_or_else(|| Error::configuration(name, "'categories' must be an object"))?;
            let mut per_category = Vec::with_capacity(categories.len());
            for (category, items) in categories {
                per_category.push((category.clone(), keyword_list(name, items)?));
            }
            Scope::PerCategory(per_category)
        } else if let Some(category) = object.get("category") {
            let category = category
                .as_str()
                .ok_or_else(|| Error::configuration(name, "'category' must be a string"))?;
            if !object.contains_key("keywords") {
                return Err(Error::configuration(name, "single-category rule without keywords"));
            }
            Scope::Category(category.to_string())
        } else if object.get("search_all_categories") == Some(&Value::Bool(true))
            || object.contains_key("keywords")
        {
            Scope::AllCategories
        } else {
            return Err(Error::configuration(name, "unrecognized rule shape"));
        };

        let rule = Self {
            name: name.to_string(),
            keywords,
            scope,
        };
        if rule.keyword_count() == 0 {
            return Err(Error::configuration(name, "rule has no keywords"));
        }
        Ok(rule)
    }

    pub fn keyword_count(&self) -> usize {
        let scoped: usize = match &self.scope {
            Scope::PerCategory(entries) => entries.iter().map(|(_, k)| k.len()).sum(),
            _ => 0,
        };
        self.keywords.len() + scoped
    }

    /// Keywords that apply inside `category`.
    pub fn keywords_for<'a>(&'a self, category: &CategoryTree) -> Vec<&'a Keyword> {
        let mut keywords: Vec<&Keyword> = Vec::new();
        if let Scope::PerCategory(entries) = &self.scope {
            for (name, scoped) in entries {
                if category.answers_to(name) {
                    keywords.extend(scoped);
                }
            }
        }
        keywords.extend(&self.keywords);
        keywords
    }

    /// True when any keyword of the rule, in any scope, hits the text.
    pub fn matches_text(&self, text: &str) -> bool {
        let scoped: Vec<&Keyword> = match &self.scope {
            Scope::PerCategory(entries) => entries.iter().flat_map(|(_, k)| k).collect(),
            _ => Vec::new(),
        };
        self.keywords
            .iter()
            .chain(scoped)
            .any(|keyword| keyword.is_match(text))
    }
}

fn keyword_list(rule: &str, value: &Value) -> Result<Vec<Keyword>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::configuration(rule, "keywords must be a list"))?;
    items
        .iter()
        .map(|item| Keyword::from_value(rule, item))
        .collect()
}

/// The decoded feature-rule configuration, in file order.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<FeatureRule>,
    /// Rules that were skipped, one `Configuration` error each
    pub warnings: Vec<Error>,
}

impl RuleSet {
    /// Decode a rule file already parsed into JSON. Only a non-object root is
    /// fatal; malformed entries are skipped and recorded in `warnings`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let entries = value.as_object().ok_or_else(|| {
            Error::configuration("<root>", "feature rules must be an object keyed by feature")
        })?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: &Map<String, Value>) -> Self {
        let mut set = RuleSet::default();
        for (name, value) in entries {
            match FeatureRule::from_value(name, value) {
                Ok(rule) => set.rules.push(rule),
                Err(e) => {
                    warn!("Skipping feature rule: {}", e);
                    set.warnings.push(e);
                }
            }
        }
        set
    }

    /// Parse JSON, or YAML when `path_hint` ends in `.yaml`/`.yml`.
    pub fn from_content(content: &str, path_hint: &str) -> Result<Self> {
        let value: Value = if is_yaml(path_hint) {
            serde_yaml::from_str(content)?
        } else {
            serde_json::from_str(content)?
        };
        Self::from_value(&value)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_content(&content, &path.to_string_lossy())
    }

    pub fn get(&self, name: &str) -> Option<&FeatureRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub(crate) fn is_yaml(path_hint: &str) -> bool {
    let lower = path_hint.to_ascii_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_is_case_insensitive_and_escaped() {
        let keyword = Keyword::literal("CCTV (24h)").unwrap();
        assert!(keyword.is_match("מערכת cctv (24H) מותקנת"));
        assert!(!keyword.is_match("cctv 24h"));
    }

    #[test]
    fn test_pattern_flags() {
        let default = Keyword::pattern("gas", &["I".to_string()]).unwrap();
        assert!(default.is_match("GAS"));
        let multiline = Keyword::pattern("^gas", &["M".to_string()]).unwrap();
        assert!(multiline.is_match("x\ngas"));
        assert!(!multiline.is_match("x\nGAS"));
        let unknown_only = Keyword::pattern("gas", &["Q".to_string()]).unwrap();
        assert!(unknown_only.is_match("GAS"));
    }

    #[test]
    fn test_decodes_every_scope() {
        let value = json!({
            "גז": {"keywords": ["גז"]},
            "בשר": {"category": "משרד הבריאות", "keywords": ["בשר"]},
            "שליחויות": {"categories": {"משטרה": ["שליח"]}, "keywords": ["משלוח"]},
            "מ\"ר": {"search_all_categories": true, "keywords": [{"regex": true, "pattern": "[0-9]+\\s*מ\"ר"}]}
        });
        let set = RuleSet::from_value(&value).unwrap();
        assert!(set.warnings.is_empty());
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["גז", "בשר", "שליחויות", "מ\"ר"]);
        assert!(matches!(set.get("גז").unwrap().scope, Scope::AllCategories));
        assert!(matches!(set.get("בשר").unwrap().scope, Scope::Category(_)));
        assert!(matches!(set.get("שליחויות").unwrap().scope, Scope::PerCategory(_)));
        assert_eq!(set.get("שליחויות").unwrap().keyword_count(), 2);
        assert!(set.get("מ\"ר").unwrap().matches_text("שטח של 120 מ\"ר"));
    }

    #[test]
    fn test_skips_only_malformed_rules() {
        let value = json!({
            "ok": {"keywords": ["x"]},
            "bad-regex": {"keywords": [{"regex": true, "pattern": "(unclosed"}]},
            "no-keywords": {"keywords": []},
            "wrong-shape": ["x"],
            "unknown": {"something": true}
        });
        let set = RuleSet::from_value(&value).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(set.warnings.len(), 4);
        assert!(set
            .warnings
            .iter()
            .all(|e| matches!(e, Error::Configuration { .. })));
    }

    #[test]
    fn test_yaml_rules() {
        let yaml = "גז:\n  keywords: [גז, gas]\n";
        let set = RuleSet::from_content(yaml, "features.yaml").unwrap();
        assert!(set.get("גז").unwrap().matches_text("Gas tank"));
        assert!(RuleSet::from_content("[1, 2]", "features.json").is_err());
    }
}
