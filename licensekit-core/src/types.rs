use crate::error::{Error, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Deepest dotted number the parser accepts (segments, chapter included).
pub const MAX_NESTING_DEPTH: usize = 20;

// ===== PARAGRAPH NUMBERS =====

/// True for `4`, `4.1`, `4.1.12` (1-20 numeric segments).
pub fn is_paragraph_number(candidate: &str) -> bool {
    let mut segments = 0;
    for segment in candidate.split('.') {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        segments += 1;
    }
    segments <= MAX_NESTING_DEPTH
}

/// Number of dotted segments, so the chapter node `4` has depth 1.
pub fn number_depth(number: &str) -> usize {
    number.split('.').count()
}

pub fn parent_number(number: &str) -> Option<&str> {
    number.rsplit_once('.').map(|(parent, _)| parent)
}

/// `4.1.2` -> [`4`, `4.1`, `4.1.2`]
pub fn number_prefixes(number: &str) -> Vec<&str> {
    number
        .match_indices('.')
        .map(|(idx, _)| &number[..idx])
        .chain(std::iter::once(number))
        .collect()
}

/// Orders by depth first, then segment by segment numerically.
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    number_depth(a)
        .cmp(&number_depth(b))
        .then_with(|| compare_segments(a, b))
}

/// Document order for numbers: segment by segment, shorter prefix first.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Deduplicate and sort numbers by depth, then numerically.
pub fn sorted_unique_numbers<I, S>(numbers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut unique: Vec<String> = numbers
        .into_iter()
        .map(Into::into)
        .filter(|n| seen.insert(n.clone()))
        .collect();
    unique.sort_by(|a, b| compare_numbers(a, b));
    unique
}

// ===== PARAGRAPH TREE =====

/// One numbered unit of regulatory text.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub category: String,
    pub number: String,
    pub text: String,
    /// Document order; keyed by each child's full number.
    pub children: Vec<Paragraph>,
}

impl Paragraph {
    pub fn new(category: &str, number: &str, text: String) -> Self {
        Self {
            category: category.to_string(),
            number: number.to_string(),
            text,
            children: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        number_depth(&self.number)
    }

    pub fn child(&self, number: &str) -> Option<&Paragraph> {
        self.children.iter().find(|c| c.number == number)
    }

    /// Pre-order walk over this paragraph and every descendant.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Explicit-stack pre-order iterator, so deep trees never recurse.
pub struct Descendants<'a> {
    stack: Vec<&'a Paragraph>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Paragraph;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// All paragraphs of one regulatory chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTree {
    pub name: String,
    /// Chapter nodes; normally exactly one, numbered with the chapter number.
    pub roots: Vec<Paragraph>,
}

impl CategoryTree {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            roots: Vec::new(),
        }
    }

    pub fn chapter_number(&self) -> Option<&str> {
        self.roots.first().map(|p| p.number.as_str())
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.roots.iter().flat_map(Paragraph::descendants)
    }

    pub fn paragraph(&self, number: &str) -> Option<&Paragraph> {
        let mut prefixes = number_prefixes(number).into_iter();
        let first = prefixes.next()?;
        let mut current = self.roots.iter().find(|p| p.number == first)?;
        for prefix in prefixes {
            current = current.child(prefix)?;
        }
        Some(current)
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().count()
    }

    /// Matches the category name, its chapter number, or the `פרק N` alias.
    pub fn answers_to(&self, key: &str) -> bool {
        let key = key.trim();
        if self.name == key {
            return true;
        }
        match self.chapter_number() {
            Some(chapter) => key == chapter || key == format!("פרק {chapter}"),
            None => false,
        }
    }
}

/// Category name -> nested paragraphs, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphTree {
    pub categories: Vec<CategoryTree>,
}

impl ParagraphTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Exact name match wins over chapter-number aliases.
    pub fn category(&self, key: &str) -> Option<&CategoryTree> {
        self.categories
            .iter()
            .find(|c| c.name == key)
            .or_else(|| self.categories.iter().find(|c| c.answers_to(key)))
    }

    pub fn paragraph(&self, category: &str, number: &str) -> Option<&Paragraph> {
        self.category(category)?.paragraph(number)
    }

    /// Paragraph text, or an empty string when the paragraph doesn't exist.
    pub fn paragraph_text(&self, category: &str, number: &str) -> &str {
        self.paragraph(category, number)
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }

    pub fn paragraph_count(&self) -> usize {
        self.categories.iter().map(CategoryTree::paragraph_count).sum()
    }

    /// Rebuild a tree from the `paragraphs.json` shape:
    /// `{category: {number: {"text": ..., <child number>: {...}}}}`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let categories = value.as_object().ok_or_else(|| {
            Error::data_unavailable("paragraph tree must be an object keyed by category")
        })?;

        let mut tree = ParagraphTree::new();
        for (name, nodes) in categories {
            let nodes = nodes.as_object().ok_or_else(|| {
                Error::data_unavailable(format!("category '{name}' is not an object"))
            })?;
            let mut category = CategoryTree::new(name);
            for (number, node) in nodes {
                if !is_paragraph_number(number) {
                    continue;
                }
                category.roots.push(paragraph_from_value(name, number, node)?);
            }
            tree.categories.push(category);
        }
        Ok(tree)
    }
}

fn paragraph_from_value(category: &str, number: &str, value: &Value) -> Result<Paragraph> {
    // Explicit stack of (parent slot path, number, value) keeps deep trees off the call stack
    let object = value.as_object().ok_or_else(|| {
        Error::data_unavailable(format!("paragraph {category}/{number} is not an object"))
    })?;
    let mut root = Paragraph::new(category, number, read_text(category, number, object)?);

    let mut pending: Vec<(Vec<usize>, &String, &Value)> = object
        .iter()
        .filter(|(k, _)| is_paragraph_number(k))
        .map(|(k, v)| (Vec::new(), k, v))
        .collect();
    pending.reverse();

    while let Some((path, child_number, child_value)) = pending.pop() {
        let child_object = child_value.as_object().ok_or_else(|| {
            Error::data_unavailable(format!(
                "paragraph {category}/{child_number} is not an object"
            ))
        })?;
        let child = Paragraph::new(
            category,
            child_number,
            read_text(category, child_number, child_object)?,
        );

        let parent = path
            .iter()
            .fold(&mut root, |node, &idx| &mut node.children[idx]);
        parent.children.push(child);

        let mut child_path = path.clone();
        child_path.push(parent.children.len() - 1);
        let mut grandchildren: Vec<_> = child_object
            .iter()
            .filter(|(k, _)| is_paragraph_number(k))
            .map(|(k, v)| (child_path.clone(), k, v))
            .collect();
        grandchildren.reverse();
        pending.extend(grandchildren);
    }

    Ok(root)
}

fn read_text(category: &str, number: &str, object: &Map<String, Value>) -> Result<String> {
    match object.get("text") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(Error::data_unavailable(format!(
            "paragraph {category}/{number} has a non-string text"
        ))),
    }
}

impl Serialize for Paragraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.children.len()))?;
        map.serialize_entry("text", &self.text)?;
        for child in &self.children {
            map.serialize_entry(&child.number, child)?;
        }
        map.end()
    }
}

impl Serialize for CategoryTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roots.len()))?;
        for root in &self.roots {
            map.serialize_entry(&root.number, root)?;
        }
        map.end()
    }
}

impl Serialize for ParagraphTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, category)?;
        }
        map.end()
    }
}

// ===== FEATURE MAPPINGS =====

/// Paragraphs selected by one feature rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureMapping {
    #[serde(serialize_with = "serialize_pairs")]
    pub categories: Vec<(String, Vec<String>)>,
    pub paragraphs: Vec<String>,
}

impl FeatureMapping {
    pub fn numbers_in(&self, category: &str) -> &[String] {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, numbers)| numbers.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Feature name -> mapping, in rule-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMappings {
    pub features: Vec<(String, FeatureMapping)>,
}

impl FeatureMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureMapping> {
        self.features
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, mapping)| mapping)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Rebuild mappings from the `mappings.json` shape:
    /// `{feature: {"categories": {name: [numbers]}, "paragraphs": [numbers]}}`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let features = value.as_object().ok_or_else(|| {
            Error::data_unavailable("feature mappings must be an object keyed by feature")
        })?;

        let mut mappings = FeatureMappings::new();
        for (feature, entry) in features {
            let entry = entry.as_object().ok_or_else(|| {
                Error::data_unavailable(format!("mapping for '{feature}' is not an object"))
            })?;

            let mut categories = Vec::new();
            if let Some(raw) = entry.get("categories") {
                let raw = raw.as_object().ok_or_else(|| {
                    Error::data_unavailable(format!(
                        "mapping for '{feature}' has non-object categories"
                    ))
                })?;
                for (category, numbers) in raw {
                    categories.push((category.clone(), string_list(feature, numbers)?));
                }
            }

            let paragraphs = match entry.get("paragraphs") {
                Some(numbers) => string_list(feature, numbers)?,
                None => sorted_unique_numbers(
                    categories.iter().flat_map(|(_, n)| n.iter().cloned()),
                ),
            };

            mappings.features.push((
                feature.clone(),
                FeatureMapping {
                    categories,
                    paragraphs,
                },
            ));
        }
        Ok(mappings)
    }
}

fn string_list(feature: &str, value: &Value) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| {
        Error::data_unavailable(format!("mapping for '{feature}' has a non-list entry"))
    })?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(Error::data_unavailable(format!(
                "mapping for '{feature}' lists a non-string paragraph number"
            ))),
        })
        .collect()
}

fn serialize_pairs<S: Serializer>(
    pairs: &[(String, Vec<String>)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (key, numbers) in pairs {
        map.serialize_entry(key, numbers)?;
    }
    map.end()
}

impl Serialize for FeatureMappings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.features.len()))?;
        for (name, mapping) in &self.features {
            map.serialize_entry(name, mapping)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_helpers() {
        assert!(is_paragraph_number("4"));
        assert!(is_paragraph_number("4.1.12"));
        assert!(!is_paragraph_number("4."));
        assert!(!is_paragraph_number("a.1"));
        assert_eq!(number_prefixes("4.1.2"), vec!["4", "4.1", "4.1.2"]);
        assert_eq!(parent_number("4.1.2"), Some("4.1"));
        assert_eq!(parent_number("4"), None);
        assert_eq!(
            sorted_unique_numbers(["4.10", "4.2", "4", "4.2"]),
            vec!["4", "4.2", "4.10"]
        );
    }

    #[test]
    fn test_tree_json_preserves_document_order() {
        let value = json!({
            "משרד הבריאות": {
                "4": {
                    "text": "",
                    "4.2": {"text": "second", "4.2.1": {"text": "nested"}},
                    "4.1": {"text": "first"}
                }
            }
        });
        let tree = ParagraphTree::from_json_value(&value).unwrap();
        let category = tree.category("משרד הבריאות").unwrap();
        let numbers: Vec<_> = category.paragraphs().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, vec!["4", "4.2", "4.2.1", "4.1"]);
        assert_eq!(tree.paragraph_text("4", "4.2.1"), "nested");
        assert_eq!(tree.paragraph_text("פרק 4", "4.1"), "first");
        assert_eq!(tree.paragraph_text("משרד הבריאות", "4.9"), "");

        let back = serde_json::to_value(&tree).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_tree_rejects_wrong_shape() {
        assert!(ParagraphTree::from_json_value(&json!(["not", "a", "map"])).is_err());
        assert!(ParagraphTree::from_json_value(&json!({"cat": {"1": {"text": 5}}})).is_err());
        assert!(ParagraphTree::from_json_value(&json!({"cat": "flat"})).is_err());
    }

    #[test]
    fn test_mappings_fill_missing_union() {
        let value = json!({
            "גז": {"categories": {"כבאות": ["5.2", "5.1"]}}
        });
        let mappings = FeatureMappings::from_json_value(&value).unwrap();
        let gas = mappings.get("גז").unwrap();
        assert_eq!(gas.paragraphs, vec!["5.1", "5.2"]);
        assert_eq!(gas.numbers_in("כבאות"), &["5.2".to_string(), "5.1".to_string()]);
        assert!(FeatureMappings::from_json_value(&json!({"גז": {"paragraphs": "5.1"}})).is_err());
    }
}
