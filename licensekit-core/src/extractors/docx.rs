use super::TextExtractor;
use crate::error::{Error, Result};
use anyhow::Context;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::info;

const DOCUMENT_PART: &str = "word/document.xml";

/// Reads the main WordprocessingML part of a `.docx` container.
///
/// Paragraphs become lines in document order, including paragraphs inside
/// table cells. Tabs become spaces and explicit breaks become newlines.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract_bytes(&self, bytes: &[u8], label: &str) -> Result<String> {
        let text = read_document(bytes).map_err(|e| Error::Extraction {
            path: label.to_string(),
            attempts: vec![format!("docx: {:#}", e)],
        })?;
        if text.trim().is_empty() {
            return Err(Error::Extraction {
                path: label.to_string(),
                attempts: vec!["docx: no text".to_string()],
            });
        }
        info!("Extracted {} chars from {}", text.len(), label);
        Ok(text)
    }

    fn name(&self) -> &str {
        "docx"
    }

    fn supports_file_type(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("docx")
    }
}

fn read_document(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip container")?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .with_context(|| format!("missing {}", DOCUMENT_PART))?
        .read_to_string(&mut xml)
        .with_context(|| format!("failed to read {}", DOCUMENT_PART))?;
    document_text(&xml)
}

/// Plain text of a `word/document.xml` body.
pub fn document_text(xml: &str) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;
    let mut run_depth = 0usize;

    loop {
        match reader.read_event().context("malformed document XML")? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:r" => run_depth += 1,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" if run_depth > 0 => out.push(' '),
                b"w:br" | b"w:cr" if run_depth > 0 => out.push('\n'),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}
