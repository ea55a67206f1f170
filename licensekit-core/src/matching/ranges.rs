//! Numeric applicability bounds written in Hebrew regulatory prose.

use crate::normalizer::is_hebrew_letter;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

const NUMBER: &str = r"(\d+(?:,\d{3})*)";
const SIZE_UNIT: &str = r#"(?:מ["'\x{05F4}\x{05F3}]?ר|מטר)"#;
const OCCUPANCY_UNIT: &str = r"(?:איש|אנשים|מקומות|מקום)";
const DASH: &str = r"[-\x{05BE}]";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Between,
    Min,
    Max,
    Exact,
}

struct Family {
    bound: Bound,
    regex: Regex,
}

fn families(unit: &str, exact_prefix: Option<&str>) -> Vec<Family> {
    let between = format!(r"בין\s+{NUMBER}\s+ל\s*{DASH}?\s*{NUMBER}\s*{unit}");
    let dashed = format!(r"{NUMBER}\s*{DASH}\s*{NUMBER}\s*{unit}");
    let max = format!(
        r"(?:עד|לא\s*יעלה\s*על|פחות\s*מ\s*{DASH}?|לא\s*יותר\s*מ\s*{DASH}?)\s*{NUMBER}\s*{unit}"
    );
    let min = format!(r"(?:מעל|יותר\s*מ\s*{DASH}?|לפחות|החל\s*מ\s*{DASH}?)\s*{NUMBER}\s*{unit}");
    let exact = match exact_prefix {
        Some(prefix) => format!(r"{prefix}\s*{NUMBER}\s*{unit}"),
        None => format!(r"{NUMBER}\s*{unit}"),
    };

    // Order matters: "לא יותר מ-" must claim its number before the "יותר מ-" minimum
    [
        (Bound::Between, between),
        (Bound::Between, dashed),
        (Bound::Max, max),
        (Bound::Min, min),
        (Bound::Exact, exact),
    ]
    .into_iter()
    .map(|(bound, pattern)| Family {
        bound,
        regex: Regex::new(&pattern).unwrap(),
    })
    .collect()
}

static SIZE_FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| families(SIZE_UNIT, None));

static OCCUPANCY_FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| {
    let prefix = format!(r"(?:תפוסה\s*של|מיועד\s*ל\s*{DASH}?)");
    families(OCCUPANCY_UNIT, Some(prefix.as_str()))
});

/// Bounds for one dimension. Empty means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sorted, unique
    pub exact: Vec<f64>,
}

impl NumericRange {
    pub fn has_bounds(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn is_constrained(&self) -> bool {
        self.has_bounds() || !self.exact.is_empty()
    }

    /// Declared min/max hold for `value` (vacuously true without bounds).
    pub fn bounds_hold(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Some exact figure lies within `ratio * value` of `value`.
    pub fn exact_within(&self, value: f64, ratio: f64) -> bool {
        self.exact
            .iter()
            .any(|exact| (value - exact).abs() <= value * ratio)
    }

    /// Whether a business of this `value` may be subject to the paragraph.
    pub fn admits(&self, value: f64, ratio: f64) -> bool {
        self.bounds_hold(value) && (self.exact.is_empty() || self.exact_within(value, ratio))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NumericRanges {
    pub size_m2: NumericRange,
    pub occupancy: NumericRange,
}

impl NumericRanges {
    pub fn is_constrained(&self) -> bool {
        self.size_m2.is_constrained() || self.occupancy.is_constrained()
    }
}

pub fn extract_numeric_ranges(text: &str) -> NumericRanges {
    NumericRanges {
        size_m2: extract_dimension(text, &SIZE_FAMILIES, true),
        occupancy: extract_dimension(text, &OCCUPANCY_FAMILIES, false),
    }
}

fn extract_dimension(text: &str, families: &[Family], bare_exact: bool) -> NumericRange {
    let mut range = NumericRange::default();
    let mut claimed: Vec<Range<usize>> = Vec::new();

    for family in families {
        for caps in family.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(first) = caps.get(1) else { continue };

            if family.bound == Bound::Exact {
                if overlaps(&claimed, first.range()) {
                    continue;
                }
                if bare_exact && !standalone(text, first.start(), whole.end()) {
                    continue;
                }
            } else if overlaps(&claimed, whole.range()) {
                continue;
            }

            let Some(value) = parse_number(first.as_str()) else {
                continue;
            };
            match family.bound {
                Bound::Between => {
                    let Some(upper) = caps.get(2).and_then(|m| parse_number(m.as_str())) else {
                        continue;
                    };
                    range.min = Some(value.min(upper));
                    range.max = Some(value.max(upper));
                }
                Bound::Min => range.min = Some(value),
                Bound::Max => range.max = Some(value),
                Bound::Exact => range.exact.push(value),
            }
            claimed.push(whole.range());
        }
    }

    range.exact.sort_by(f64::total_cmp);
    range.exact.dedup();
    range
}

fn overlaps(claimed: &[Range<usize>], span: Range<usize>) -> bool {
    claimed
        .iter()
        .any(|c| c.start < span.end && span.start < c.end)
}

/// A bare `120 מ"ר` must not be glued to Hebrew letters on either side.
fn standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_hebrew_letter) && !after.is_some_and(is_hebrew_letter)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_range_forms() {
        let between = extract_numeric_ranges("לעסק בשטח בין 100 ל-200 מ\"ר");
        assert_eq!(between.size_m2.min, Some(100.0));
        assert_eq!(between.size_m2.max, Some(200.0));
        assert!(between.size_m2.exact.is_empty());

        let dashed = extract_numeric_ranges("עסק בשטח 100-200 מ\"ר");
        assert_eq!((dashed.size_m2.min, dashed.size_m2.max), (Some(100.0), Some(200.0)));
        assert!(dashed.size_m2.exact.is_empty());
    }

    #[test]
    fn test_min_and_max_phrases() {
        let ranges = extract_numeric_ranges("מעל 50 מ\"ר ולא יותר מ-1,000 מ\"ר");
        assert_eq!(ranges.size_m2.min, Some(50.0));
        assert_eq!(ranges.size_m2.max, Some(1000.0));

        let cap = extract_numeric_ranges("עסק ששטחו עד 300 מ\"ר");
        assert_eq!(cap.size_m2.max, Some(300.0));
        assert_eq!(cap.size_m2.min, None);
        assert!(cap.size_m2.exact.is_empty());
    }

    #[test]
    fn test_exact_values() {
        let ranges = extract_numeric_ranges("אולם של 120 מ\"ר ועוד 80 מטר, 120 מ\"ר");
        assert_eq!(ranges.size_m2.exact, vec![80.0, 120.0]);
        let glued = extract_numeric_ranges("120 מטרים");
        assert!(glued.size_m2.exact.is_empty());
    }

    #[test]
    fn test_occupancy() {
        let ranges = extract_numeric_ranges("מקום המיועד ל-80 איש, לפחות 20 מקומות ישיבה");
        assert_eq!(ranges.occupancy.exact, vec![80.0]);
        assert_eq!(ranges.occupancy.min, Some(20.0));
        assert!(!ranges.size_m2.is_constrained());

        let between = extract_numeric_ranges("בין 30 ל-50 אנשים");
        assert_eq!((between.occupancy.min, between.occupancy.max), (Some(30.0), Some(50.0)));
    }

    #[test]
    fn test_admits() {
        let range = NumericRange {
            min: Some(100.0),
            max: Some(200.0),
            exact: vec![],
        };
        assert!(range.admits(120.0, 0.3));
        assert!(!range.admits(99.0, 0.3));
        let exact = NumericRange {
            exact: vec![120.0],
            ..Default::default()
        };
        assert!(exact.admits(100.0, 0.3));
        assert!(!exact.admits(50.0, 0.3));
        assert!(NumericRange::default().admits(1.0, 0.3));
    }
}
