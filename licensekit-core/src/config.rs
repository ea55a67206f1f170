use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_pdf_strategies() -> Vec<String> {
    vec![
        "pdf-extract".to_string(),
        "lopdf".to_string(),
        "pdftotext".to_string(),
    ]
}

fn default_pdftotext_binary() -> String {
    "pdftotext".to_string()
}

fn default_excerpt_chars() -> usize {
    40
}

fn default_max_depth() -> usize {
    crate::types::MAX_NESTING_DEPTH
}

fn default_base_score() -> f64 {
    0.3
}

fn default_range_bonus() -> f64 {
    0.4
}

fn default_exact_bonus() -> f64 {
    0.3
}

fn default_feature_bonus() -> f64 {
    0.2
}

fn default_safety_bonus() -> f64 {
    0.3
}

fn default_violation_penalty() -> f64 {
    0.2
}

fn default_high_threshold() -> f64 {
    0.8
}

fn default_medium_threshold() -> f64 {
    0.5
}

fn default_min_relevance() -> f64 {
    0.3
}

fn default_exact_tolerance_ratio() -> f64 {
    0.3
}

fn default_safety_terms() -> Vec<String> {
    ["חירום", "בטיחות", "כיבוי", "emergency", "safety"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_meat_terms() -> Vec<String> {
    ["בשר", "כשר", "meat"].iter().map(|s| s.to_string()).collect()
}

/// Top-level pipeline and matching configuration (YAML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicensekitConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// PDF strategies to try, in order. Unknown or disabled names are skipped.
    #[serde(default = "default_pdf_strategies")]
    pub pdf_strategies: Vec<String>,
    /// Binary used by the `pdftotext` strategy
    #[serde(default = "default_pdftotext_binary")]
    pub pdftotext_binary: String,
    /// Characters shown on each side when verification fails
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_strategies: default_pdf_strategies(),
            pdftotext_binary: default_pdftotext_binary(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Deepest paragraph number accepted as a header (segments)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Open an implicit `פרק N` category for numbered lines before any chapter header
    #[serde(default = "default_true")]
    pub implicit_categories: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            implicit_categories: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_base_score")]
    pub base_score: f64,
    /// Added per dimension when a declared min/max is satisfied
    #[serde(default = "default_range_bonus")]
    pub range_bonus: f64,
    /// Added per dimension when an exact value is within tolerance
    #[serde(default = "default_exact_bonus")]
    pub exact_bonus: f64,
    /// Added per selected feature whose keywords hit the paragraph
    #[serde(default = "default_feature_bonus")]
    pub feature_bonus: f64,
    #[serde(default = "default_safety_bonus")]
    pub safety_bonus: f64,
    /// Multiplier applied when the profile violates a declared constraint
    #[serde(default = "default_violation_penalty")]
    pub violation_penalty: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    /// Fraction of the profile value an exact figure may differ by
    #[serde(default = "default_exact_tolerance_ratio")]
    pub exact_tolerance_ratio: f64,
    #[serde(default = "default_safety_terms")]
    pub safety_terms: Vec<String>,
    /// Added when a meat-serving profile meets a paragraph naming one of
    /// `meat_terms`. Zero leaves scoring untouched.
    #[serde(default)]
    pub meat_bonus: f64,
    #[serde(default = "default_meat_terms")]
    pub meat_terms: Vec<String>,
    /// Drop paragraphs whose numeric constraints the profile violates
    #[serde(default = "default_true")]
    pub hard_filter: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            base_score: default_base_score(),
            range_bonus: default_range_bonus(),
            exact_bonus: default_exact_bonus(),
            feature_bonus: default_feature_bonus(),
            safety_bonus: default_safety_bonus(),
            violation_penalty: default_violation_penalty(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            min_relevance: default_min_relevance(),
            exact_tolerance_ratio: default_exact_tolerance_ratio(),
            safety_terms: default_safety_terms(),
            meat_bonus: 0.0,
            meat_terms: default_meat_terms(),
            hard_filter: true,
        }
    }
}

impl LicensekitConfig {
    /// Load config from YAML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LicensekitConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!("Failed to load config from {}, using defaults: {}", p, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
matching:
  min_relevance: 0.5
  hard_filter: false
extraction:
  pdf_strategies: [pdftotext]
"#;
        let config: LicensekitConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.matching.min_relevance, 0.5);
        assert!(!config.matching.hard_filter);
        assert_eq!(config.matching.base_score, 0.3);
        assert_eq!(config.extraction.pdf_strategies, vec!["pdftotext"]);
        assert_eq!(config.extraction.pdftotext_binary, "pdftotext");
        assert_eq!(config.parser.max_depth, 20);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = LicensekitConfig::load_with_fallback(Some("/nonexistent/licensekit.yaml"));
        assert_eq!(config.matching.high_threshold, 0.8);
        assert_eq!(config.matching.safety_terms.len(), 5);
    }
}
