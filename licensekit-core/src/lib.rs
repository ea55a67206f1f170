// Licensekit Core Library
//
// Turns a regulation document into a paragraph tree and feature mapping,
// and matches business profiles against those artifacts.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod extractors;
pub mod features;
pub mod matching;
pub mod normalizer;
pub mod parser;
pub mod processor;
pub mod storage;
pub mod store;
pub mod types;

// Re-export main types and functions for easy use
pub use artifacts::{ArtifactSet, Manifest};
pub use config::LicensekitConfig;
pub use error::{Error, Result};
pub use extractors::{extract_file, verify_text, SourceKind, TextExtractor};
pub use features::{map_features, FeatureRule, RuleSet};
pub use matching::{match_requirements, BusinessProfile, MatchReport, MatchingEngine, Priority};
pub use normalizer::normalize;
pub use parser::parse;
pub use processor::{compare_outputs, DocumentProcessor, PipelineStages, Stage, StageProfiler};
pub use storage::{ArtifactStorage, FileStorage, InMemoryStorage};
pub use store::RulesStore;
pub use types::*;
