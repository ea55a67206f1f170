use crate::artifacts::{
    parse_manifest, parse_mappings, parse_paragraphs, Manifest, FEATURES_FILES, MANIFEST_FILE,
    MAPPINGS_FILE, PARAGRAPHS_FILE,
};
use crate::error::{Error, Result};
use crate::features::RuleSet;
use crate::storage::{ArtifactStorage, FileStorage};
use crate::types::{FeatureMappings, ParagraphTree};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Generated artifacts, loaded once and shared read-only.
#[derive(Debug)]
pub struct LoadedRules {
    pub tree: ParagraphTree,
    pub mappings: FeatureMappings,
    /// Absent when no rule file is stored next to the artifacts
    pub rules: Option<RuleSet>,
    pub manifest: Option<Manifest>,
}

/// Memoized loader for the rules artifacts.
///
/// The first `load` reads and validates everything while holding the lock,
/// so concurrent first callers wait for it and all observe the same `Arc`.
pub struct RulesStore {
    storage: Arc<dyn ArtifactStorage>,
    rules_path: Option<PathBuf>,
    cache: Mutex<Option<Arc<LoadedRules>>>,
    loads: AtomicUsize,
}

impl RulesStore {
    pub fn new(storage: Arc<dyn ArtifactStorage>) -> Self {
        Self {
            storage,
            rules_path: None,
            cache: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FileStorage::new(dir)))
    }

    /// Read feature rules from `path` instead of the copy next to the artifacts.
    pub fn with_rules_file(mut self, path: impl AsRef<Path>) -> Self {
        self.rules_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load(&self) -> Result<Arc<LoadedRules>> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(loaded) = cache.as_ref() {
            return Ok(Arc::clone(loaded));
        }
        let loaded = Arc::new(self.read_artifacts()?);
        *cache = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Drop the cached artifacts; the next `load` reads storage again.
    pub fn reset(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        *cache = None;
    }

    /// Number of times artifacts were actually read from storage
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn read_artifacts(&self) -> Result<LoadedRules> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let location = self.storage.location();

        let tree = parse_paragraphs(&self.require(PARAGRAPHS_FILE)?)?;
        let mappings = parse_mappings(&self.require(MAPPINGS_FILE)?)?;

        let manifest = match self.storage.read(MANIFEST_FILE)? {
            Some(content) => match parse_manifest(&content) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Ignoring manifest in {}: {}", location, e);
                    None
                }
            },
            None => None,
        };
        if let Some(manifest) = &manifest {
            if !manifest.is_current() {
                warn!(
                    "Artifacts in {} use format {}, expected {}",
                    location,
                    manifest.artifact_version,
                    crate::artifacts::versions::ARTIFACT_VERSION
                );
            }
        }

        let rules = self.read_rules()?;
        info!(
            "Loaded {} categories, {} feature mappings from {}",
            tree.categories.len(),
            mappings.len(),
            location
        );

        Ok(LoadedRules {
            tree,
            mappings,
            rules,
            manifest,
        })
    }

    fn require(&self, name: &str) -> Result<String> {
        self.storage.read(name)?.ok_or_else(|| {
            Error::data_unavailable(format!("{} missing in {}", name, self.storage.location()))
        })
    }

    fn read_rules(&self) -> Result<Option<RuleSet>> {
        if let Some(path) = &self.rules_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::data_unavailable(format!("cannot read {}: {}", path.display(), e))
            })?;
            return decode_rules(&content, &path.to_string_lossy()).map(Some);
        }

        for name in FEATURES_FILES {
            if let Some(content) = self.storage.read(name)? {
                return decode_rules(&content, name).map(Some);
            }
        }
        Ok(None)
    }
}

fn decode_rules(content: &str, name: &str) -> Result<RuleSet> {
    RuleSet::from_content(content, name)
        .map_err(|e| Error::data_unavailable(format!("feature rules in {name}: {e}")))
}
