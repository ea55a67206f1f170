//! Feature rules and the keyword mapper that applies them to a paragraph tree.

pub mod mapper;
pub mod rule;

pub use mapper::{map_features, map_rule};
pub use rule::{FeatureRule, Keyword, KeywordKind, RuleSet, Scope};
