use thiserror::Error;

/// Errors surfaced by the licensekit components.
///
/// Parsing anomalies are deliberately absent: malformed regulatory text
/// degrades into body text instead of failing.
#[derive(Debug, Error)]
pub enum Error {
    /// No extraction strategy produced text for the document.
    #[error("failed to extract text from {path}: {}", attempts.join("; "))]
    Extraction { path: String, attempts: Vec<String> },

    /// The two source encodings of one document disagree.
    #[error("sources disagree at character {position}: '{left}' vs '{right}'")]
    Verification {
        position: usize,
        left: String,
        right: String,
    },

    /// Generated artifacts are missing or not in the expected shape.
    #[error("rules data unavailable: {0}")]
    DataUnavailable(String),

    /// A single feature rule is malformed; callers record it and skip the rule.
    #[error("invalid feature rule '{rule}': {reason}")]
    Configuration { rule: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn data_unavailable(reason: impl Into<String>) -> Self {
        Error::DataUnavailable(reason.into())
    }
}
