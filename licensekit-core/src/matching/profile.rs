use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

const GAS_TERMS: [&str; 3] = ["uses_gas", "gas", "גז"];
const MEAT_TERMS: [&str; 3] = ["serves_meat", "meat", "בשר"];

/// Normalized description of a business.
///
/// Absent, zero or negative figures are `None`: missing data is never
/// treated as a constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BusinessProfile {
    pub size_m2: Option<f64>,
    pub seats: Option<u32>,
    /// Lower-cased, de-duplicated, input order
    pub attributes: Vec<String>,
    pub uses_gas: bool,
    pub serves_meat: bool,
}

impl BusinessProfile {
    pub fn new<I, S>(size_m2: Option<f64>, seats: Option<f64>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let attributes = normalize_attributes(attributes);
        let uses_gas = has_any(&attributes, &GAS_TERMS);
        let serves_meat = has_any(&attributes, &MEAT_TERMS);
        Self {
            size_m2: size_m2.and_then(positive),
            seats: seats.and_then(positive).and_then(to_seats),
            attributes,
            uses_gas,
            serves_meat,
        }
    }

    /// Build a profile from questionnaire answers.
    ///
    /// Accepts `size_m2`, `seats` (or the older `seating`), `attributes` as a
    /// list or a single string, and explicit `uses_gas` / `serves_meat` flags
    /// that override what the attributes imply.
    pub fn from_answers(answers: &Value) -> Self {
        let size = answers.get("size_m2").and_then(coerce_number);
        let seats = answers
            .get("seats")
            .and_then(coerce_number)
            .or_else(|| answers.get("seating").and_then(coerce_number));

        let attributes: Vec<String> = match answers.get("attributes") {
            Some(Value::Array(items)) => items.iter().filter_map(attribute_text).collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };

        let mut profile = Self::new(size, seats, attributes);
        if let Some(flag) = answers.get("uses_gas").and_then(coerce_bool) {
            profile.uses_gas = flag;
        }
        if let Some(flag) = answers.get("serves_meat").and_then(coerce_bool) {
            profile.serves_meat = flag;
        }
        profile
    }

    pub fn seats_value(&self) -> Option<f64> {
        self.seats.map(f64::from)
    }

    /// Flags that call for special handling, for report summaries.
    pub fn special_requirements(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.uses_gas {
            flags.push("gas");
        }
        if self.serves_meat {
            flags.push("meat");
        }
        flags
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.attributes.iter().any(|a| *a == wanted)
    }
}

fn normalize_attributes<I, S>(attributes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    attributes
        .into_iter()
        .map(|a| a.as_ref().trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.clone()))
        .collect()
}

fn has_any(attributes: &[String], terms: &[&str]) -> bool {
    attributes.iter().any(|a| terms.contains(&a.as_str()))
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn to_seats(value: f64) -> Option<u32> {
    let rounded = value.round();
    (rounded >= 1.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
