use super::PdfStrategy;
use anyhow::{Context, Result};

/// Pure-Rust extraction via `pdf-extract`, entirely in memory.
pub struct PdfExtractStrategy;

impl PdfStrategy for PdfExtractStrategy {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes).context("pdf-extract could not read the document")
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn is_available(&self) -> bool {
        true
    }
}
