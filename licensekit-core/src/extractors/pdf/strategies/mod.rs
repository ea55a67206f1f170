//! PDF text extraction strategies
//!
//! Each strategy is one independent way of pulling text out of a PDF. The
//! extractor tries them in configured order and keeps the first non-empty
//! result.

#[cfg(feature = "lopdf-backend")]
pub mod page_text;
#[cfg(feature = "pdf-extract-backend")]
pub mod in_memory;
pub mod poppler;

use anyhow::Result;

/// Trait for PDF text extraction strategies
pub trait PdfStrategy: Send + Sync {
    /// Extract plain text from raw PDF bytes
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;

    /// Name used in configuration and failure reports
    fn name(&self) -> &str;

    /// Whether the strategy can run in this environment
    fn is_available(&self) -> bool;
}
