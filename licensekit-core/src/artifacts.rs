use crate::error::{Error, Result};
use crate::storage::ArtifactStorage;
use crate::types::{FeatureMappings, ParagraphTree};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// Version constants stamped into every manifest
pub mod versions {
    pub const LICENSEKIT_VERSION: &str = env!("CARGO_PKG_VERSION");
    /// Bump when the shape of `paragraphs.json` / `mappings.json` changes
    pub const ARTIFACT_VERSION: &str = "1.0.0";
    /// Bump when normalizer or parser output changes for the same input
    pub const PROCESSING_VERSION: &str = "1.0.0";
}

pub const PARAGRAPHS_FILE: &str = "paragraphs.json";
pub const MAPPINGS_FILE: &str = "mappings.json";
pub const MANIFEST_FILE: &str = "manifest.json";
/// Copies of the rule file kept next to the artifacts, in lookup order
pub const FEATURES_FILES: [&str; 3] = ["features.json", "features.yaml", "features.yml"];

/// Provenance of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub licensekit_version: String,
    pub artifact_version: String,
    pub processing_version: String,
    pub source_file: String,
    pub source_hash: String,
    pub rules_hash: String,
    #[serde(default)]
    pub verified_against: Option<String>,
    pub category_count: usize,
    pub paragraph_count: usize,
    pub feature_count: usize,
    #[serde(default)]
    pub skipped_rules: Vec<String>,
}

impl Manifest {
    pub fn new(source_file: &str, source_hash: String, rules_hash: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            licensekit_version: versions::LICENSEKIT_VERSION.to_string(),
            artifact_version: versions::ARTIFACT_VERSION.to_string(),
            processing_version: versions::PROCESSING_VERSION.to_string(),
            source_file: source_file.to_string(),
            source_hash,
            rules_hash,
            verified_against: None,
            category_count: 0,
            paragraph_count: 0,
            feature_count: 0,
            skipped_rules: Vec::new(),
        }
    }

    /// Fill in the counters from the generated artifacts.
    pub fn with_counts(mut self, tree: &ParagraphTree, mappings: &FeatureMappings) -> Self {
        self.category_count = tree.categories.len();
        self.paragraph_count = tree.paragraph_count();
        self.feature_count = mappings.len();
        self
    }

    pub fn is_current(&self) -> bool {
        self.artifact_version == versions::ARTIFACT_VERSION
    }
}

pub fn parse_paragraphs(content: &str) -> Result<ParagraphTree> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::data_unavailable(format!("{PARAGRAPHS_FILE} is not valid JSON: {e}")))?;
    ParagraphTree::from_json_value(&value)
}

pub fn parse_mappings(content: &str) -> Result<FeatureMappings> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::data_unavailable(format!("{MAPPINGS_FILE} is not valid JSON: {e}")))?;
    FeatureMappings::from_json_value(&value)
}

pub fn parse_manifest(content: &str) -> Result<Manifest> {
    serde_json::from_str(content)
        .map_err(|e| Error::data_unavailable(format!("{MANIFEST_FILE} is malformed: {e}")))
}

/// Everything one pipeline run persists.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub tree: ParagraphTree,
    pub mappings: FeatureMappings,
    pub manifest: Manifest,
    /// Raw rule file and the name it is stored under
    pub rules: Option<(String, String)>,
}

impl ArtifactSet {
    pub fn write_to(&self, storage: &dyn ArtifactStorage) -> Result<()> {
        storage.write(PARAGRAPHS_FILE, &serde_json::to_string_pretty(&self.tree)?)?;
        storage.write(MAPPINGS_FILE, &serde_json::to_string_pretty(&self.mappings)?)?;
        storage.write(MANIFEST_FILE, &serde_json::to_string_pretty(&self.manifest)?)?;
        if let Some((name, content)) = &self.rules {
            storage.write(name, content)?;
        }
        info!(
            "Wrote {} categories / {} features to {}",
            self.tree.categories.len(),
            self.mappings.len(),
            storage.location()
        );
        Ok(())
    }
}

/// File name the rule copy is stored under, keeping its format.
pub fn features_file_for(rules_path: &str) -> &'static str {
    if crate::features::rule::is_yaml(rules_path) {
        FEATURES_FILES[1]
    } else {
        FEATURES_FILES[0]
    }
}
