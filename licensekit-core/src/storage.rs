use crate::error::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage abstraction for generated artifacts, addressed by file name
/// (`paragraphs.json`, `mappings.json`, ...).
pub trait ArtifactStorage: Send + Sync {
    /// `Ok(None)` when the artifact doesn't exist.
    fn read(&self, name: &str) -> Result<Option<String>>;
    fn write(&self, name: &str, content: &str) -> Result<()>;
    /// Human-readable location for log and error messages
    fn location(&self) -> String;
}

/// Directory-backed storage
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens `root` without creating it; writes create it on demand.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ArtifactStorage for FileStorage {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.artifact_path(name);
        if path.exists() {
            Ok(Some(fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.artifact_path(name), content)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory storage for tests and embedding callers
#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(self, name: &str, content: &str) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_string(), content.to_string());
        }
        self
    }

    pub fn remove(&self, name: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(name);
        }
    }
}

impl ArtifactStorage for InMemoryStorage {
    fn read(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .files
            .lock()
            .ok()
            .and_then(|files| files.get(name).cloned()))
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_string(), content.to_string());
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// SHA-256 of a source document
pub fn calculate_source_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of serialized configuration (rule files, pipeline config)
pub fn calculate_config_hash<T: serde::Serialize>(config: &T) -> Result<String> {
    let config_json = serde_json::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(config_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert!(storage.read("paragraphs.json").unwrap().is_none());
        storage.write("paragraphs.json", "{\"a\": 1}").unwrap();
        assert_eq!(
            storage.read("paragraphs.json").unwrap().as_deref(),
            Some("{\"a\": 1}")
        );
        assert!(storage.location().ends_with("nested"));
    }

    #[test]
    fn test_in_memory_storage() {
        let storage = InMemoryStorage::new().with_artifact("mappings.json", "{}");
        assert_eq!(storage.read("mappings.json").unwrap().as_deref(), Some("{}"));
        storage.remove("mappings.json");
        assert!(storage.read("mappings.json").unwrap().is_none());
    }

    #[test]
    fn test_hashes_are_stable() {
        let a = calculate_source_hash(b"regulation");
        assert_eq!(a, calculate_source_hash(b"regulation"));
        assert_ne!(a, calculate_source_hash(b"regulations"));
        assert_eq!(a.len(), 64);

        let config = crate::config::LicensekitConfig::default();
        assert_eq!(
            calculate_config_hash(&config).unwrap(),
            calculate_config_hash(&config).unwrap()
        );
    }
}
