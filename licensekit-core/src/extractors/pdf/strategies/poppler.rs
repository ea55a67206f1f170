use super::PdfStrategy;
use anyhow::{anyhow, bail, Context, Result};
use std::io::Write;
use std::process::Command;

/// Shells out to poppler's `pdftotext`, which handles right-to-left text
/// better than the pure-Rust strategies on some documents.
pub struct PdftotextStrategy {
    binary: String,
}

impl PdftotextStrategy {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PdfStrategy for PdftotextStrategy {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .prefix("licensekit-")
            .suffix(".pdf")
            .tempfile()
            .context("failed to create temp file for pdftotext")?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let path = tmp
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("temp path is not valid UTF-8"))?;

        let output = Command::new(&self.binary)
            .args(["-layout", "-enc", "UTF-8", path, "-"])
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => anyhow!("'{}' not found on PATH", self.binary),
                _ => anyhow!("failed to run '{}': {}", self.binary, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.binary, output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "pdftotext"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-v")
            .output()
            .is_ok()
    }
}
