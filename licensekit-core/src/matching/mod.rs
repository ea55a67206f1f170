//! Matching engine: which paragraphs apply to a business profile, and how much.
//!
//! ```text
//! answers → BusinessProfile
//!     ↓
//! applicable features → candidate paragraphs (via mappings + tree)
//!     ↓
//! numeric ranges → filter → score → threshold → rank
//!     ↓
//! MatchReport
//! ```

pub mod engine;
pub mod profile;
pub mod ranges;
pub mod scoring;

pub use engine::{
    classify_feature, match_requirements, FeatureClass, Match, MatchReport, MatchingEngine,
    PriorityBreakdown,
};
pub use profile::BusinessProfile;
pub use ranges::{extract_numeric_ranges, NumericRange, NumericRanges};
pub use scoring::{score_paragraph, violates, Priority};
