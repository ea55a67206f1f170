//! Text extraction from the two source encodings of a regulation document.

pub mod docx;
pub mod pdf;
pub mod verify;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use verify::verify_text;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Source document encodings that can be turned into plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Docx,
}

impl SourceKind {
    /// Infer the encoding from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "docx" => Some(SourceKind::Docx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
        }
    }
}

/// Turns a document's bytes into plain text.
pub trait TextExtractor: Send + Sync {
    /// `label` names the document in error messages.
    fn extract_bytes(&self, bytes: &[u8], label: &str) -> Result<String>;

    fn name(&self) -> &str;

    fn supports_file_type(&self, extension: &str) -> bool;

    fn extract_file(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        self.extract_bytes(&bytes, &path.display().to_string())
    }
}

/// Extract text from `path`, inferring the encoding when `kind` is `None`.
pub fn extract_file(path: &Path, kind: Option<SourceKind>, config: &ExtractionConfig) -> Result<String> {
    let kind = kind.or_else(|| SourceKind::from_path(path)).ok_or_else(|| Error::Extraction {
        path: path.display().to_string(),
        attempts: vec!["unrecognized file type; expected .pdf or .docx".to_string()],
    })?;

    let pdf = PdfExtractor::from_config(config);
    let extractors: [&dyn TextExtractor; 2] = [&pdf, &DocxExtractor];
    let extractor = extractors
        .into_iter()
        .find(|e| e.supports_file_type(kind.extension()))
        .ok_or_else(|| Error::Extraction {
            path: path.display().to_string(),
            attempts: vec![format!("no extractor for .{}", kind.extension())],
        })?;
    debug!("Extracting {} with the {} extractor", path.display(), extractor.name());
    extractor.extract_file(path)
}
