use super::PdfStrategy;
use anyhow::{bail, Context, Result};
use lopdf::Document;
use tracing::debug;

/// Page-by-page extraction from the `lopdf` object model.
///
/// Pages that fail to decode are skipped; the document fails only when no
/// page yields text.
pub struct LopdfStrategy;

impl PdfStrategy for LopdfStrategy {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let doc = Document::load_mem(bytes).context("lopdf could not parse the document")?;
        if doc.is_encrypted() {
            bail!("document is encrypted");
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            bail!("document has no pages");
        }

        let mut text = String::new();
        for page_number in pages.keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(page) => {
                    text.push_str(&page);
                    if !page.ends_with('\n') {
                        text.push('\n');
                    }
                }
                Err(e) => debug!("lopdf skipped page {}: {}", page_number, e),
            }
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "lopdf"
    }

    fn is_available(&self) -> bool {
        true
    }
}
