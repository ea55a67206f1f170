pub mod strategies;

use self::strategies::PdfStrategy;
use super::TextExtractor;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use tracing::{debug, info, warn};

#[cfg(feature = "pdf-extract-backend")]
use self::strategies::in_memory::PdfExtractStrategy;
#[cfg(feature = "lopdf-backend")]
use self::strategies::page_text::LopdfStrategy;
use self::strategies::poppler::PdftotextStrategy;

/// Enum wrapper for the compiled-in PDF strategies
pub enum PdfStrategyImpl {
    #[cfg(feature = "pdf-extract-backend")]
    PdfExtract(PdfExtractStrategy),
    #[cfg(feature = "lopdf-backend")]
    Lopdf(LopdfStrategy),
    Pdftotext(PdftotextStrategy),
}

impl PdfStrategyImpl {
    /// Resolve a configured strategy name. `None` when unknown or not compiled in.
    pub fn from_name(name: &str, config: &ExtractionConfig) -> Option<Self> {
        match name {
            #[cfg(feature = "pdf-extract-backend")]
            "pdf-extract" => Some(PdfStrategyImpl::PdfExtract(PdfExtractStrategy)),
            #[cfg(feature = "lopdf-backend")]
            "lopdf" => Some(PdfStrategyImpl::Lopdf(LopdfStrategy)),
            "pdftotext" => Some(PdfStrategyImpl::Pdftotext(PdftotextStrategy::new(
                config.pdftotext_binary.clone(),
            ))),
            _ => None,
        }
    }
}

impl PdfStrategy for PdfStrategyImpl {
    fn extract_text(&self, bytes: &[u8]) -> anyhow::Result<String> {
        match self {
            #[cfg(feature = "pdf-extract-backend")]
            PdfStrategyImpl::PdfExtract(s) => s.extract_text(bytes),
            #[cfg(feature = "lopdf-backend")]
            PdfStrategyImpl::Lopdf(s) => s.extract_text(bytes),
            PdfStrategyImpl::Pdftotext(s) => s.extract_text(bytes),
        }
    }

    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "pdf-extract-backend")]
            PdfStrategyImpl::PdfExtract(s) => s.name(),
            #[cfg(feature = "lopdf-backend")]
            PdfStrategyImpl::Lopdf(s) => s.name(),
            PdfStrategyImpl::Pdftotext(s) => s.name(),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "pdf-extract-backend")]
            PdfStrategyImpl::PdfExtract(s) => s.is_available(),
            #[cfg(feature = "lopdf-backend")]
            PdfStrategyImpl::Lopdf(s) => s.is_available(),
            PdfStrategyImpl::Pdftotext(s) => s.is_available(),
        }
    }
}

/// PDF extractor that falls through a chain of strategies.
pub struct PdfExtractor {
    strategies: Vec<PdfStrategyImpl>,
}

impl PdfExtractor {
    pub fn new(strategies: Vec<PdfStrategyImpl>) -> Self {
        Self { strategies }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        let strategies = config
            .pdf_strategies
            .iter()
            .filter_map(|name| {
                let strategy = PdfStrategyImpl::from_name(name, config);
                if strategy.is_none() {
                    warn!("Skipping unknown or disabled PDF strategy '{}'", name);
                }
                strategy
            })
            .collect();
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl TextExtractor for PdfExtractor {
    fn extract_bytes(&self, bytes: &[u8], label: &str) -> Result<String> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            if !strategy.is_available() {
                debug!("{} is not available, skipping", strategy.name());
                attempts.push(format!("{}: unavailable", strategy.name()));
                continue;
            }
            match strategy.extract_text(bytes) {
                Ok(text) if !text.trim().is_empty() => {
                    info!("Extracted {} chars from {} via {}", text.len(), label, strategy.name());
                    return Ok(text);
                }
                Ok(_) => {
                    debug!("{} returned no text for {}", strategy.name(), label);
                    attempts.push(format!("{}: no text", strategy.name()));
                }
                Err(e) => {
                    debug!("{} failed for {}: {:#}", strategy.name(), label, e);
                    attempts.push(format!("{}: {:#}", strategy.name(), e));
                }
            }
        }

        if attempts.is_empty() {
            attempts.push("no PDF strategies configured".to_string());
        }
        Err(Error::Extraction {
            path: label.to_string(),
            attempts,
        })
    }

    fn name(&self) -> &str {
        "pdf"
    }

    fn supports_file_type(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategies_are_skipped() {
        let config = ExtractionConfig {
            pdf_strategies: vec!["ocr".to_string(), "pdftotext".to_string()],
            ..Default::default()
        };
        let extractor = PdfExtractor::from_config(&config);
        assert_eq!(extractor.strategy_names(), vec!["pdftotext"]);
    }

    #[test]
    fn test_every_failure_is_reported() {
        let config = ExtractionConfig {
            pdf_strategies: vec!["pdftotext".to_string()],
            pdftotext_binary: "licensekit-no-such-binary".to_string(),
            ..Default::default()
        };
        let err = PdfExtractor::from_config(&config)
            .extract_bytes(b"not a pdf", "broken.pdf")
            .unwrap_err();
        match err {
            Error::Extraction { path, attempts } => {
                assert_eq!(path, "broken.pdf");
                assert_eq!(attempts, vec!["pdftotext: unavailable"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_chain() {
        let err = PdfExtractor::new(Vec::new()).extract_bytes(b"", "x.pdf").unwrap_err();
        assert!(err.to_string().contains("no PDF strategies"));
    }
}
