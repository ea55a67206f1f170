//! Hierarchical paragraph parser.
//!
//! Turns normalized text into a [`ParagraphTree`]. The parser keeps an explicit
//! stack of open paragraphs per category; a numbered line only becomes a header
//! when its parent number is open, so stray numbers in running text (dates,
//! quantities, cross references) degrade into body text.

use crate::config::ParserConfig;
use crate::types::{number_depth, parent_number, CategoryTree, Paragraph, ParagraphTree};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static CHAPTER_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^פרק\s+(\d+)\s*(?:-\s*(.+?))?\s*$").unwrap());

static NUMBER_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+){0,19})(?:[\s.\-)]|$)").unwrap());

/// Parse normalized text with the default parser settings.
pub fn parse(text: &str) -> ParagraphTree {
    ParagraphParser::new(&ParserConfig::default()).parse(text)
}

/// Prefix a relative paragraph number with the current chapter.
///
/// `1` in chapter 4 becomes `4.1`; `4.1` and `4` are already absolute.
pub fn canonicalize_number(raw: &str, chapter: Option<&str>) -> String {
    match chapter {
        None => raw.to_string(),
        Some(chapter) => {
            let absolute = raw == chapter
                || raw
                    .strip_prefix(chapter)
                    .is_some_and(|rest| rest.starts_with('.'));
            if absolute {
                raw.to_string()
            } else {
                format!("{chapter}.{raw}")
            }
        }
    }
}

pub struct ParagraphParser {
    max_depth: usize,
    implicit_categories: bool,
}

impl ParagraphParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            implicit_categories: config.implicit_categories,
        }
    }

    /// Never fails: anything that isn't a well-placed header is body text.
    pub fn parse(&self, text: &str) -> ParagraphTree {
        let mut state = ParseState::default();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(caps) = CHAPTER_HEADER.captures(line) {
                let chapter = &caps[1];
                let name = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_else(|| format!("פרק {chapter}"));
                state.open_category(&name, chapter);
                continue;
            }

            if let Some(caps) = NUMBER_START.captures(line) {
                let raw = &caps[1];
                if state.current.is_none() && self.implicit_categories {
                    let chapter = raw.split('.').next().unwrap_or(raw);
                    let name = format!("פרק {chapter}");
                    debug!("Numbered line before any chapter header, opening '{}'", name);
                    state.open_category(&name, chapter);
                }
                if self.try_header(&mut state, raw, line) {
                    continue;
                }
            }

            state.append_body(line);
        }

        state.finish()
    }

    fn try_header(&self, state: &mut ParseState, raw: &str, line: &str) -> bool {
        let Some(category) = state.current_category_mut() else {
            return false;
        };
        let number = canonicalize_number(raw, Some(&category.chapter));

        if number_depth(&number) > self.max_depth {
            debug!("'{}' exceeds depth {}, treating as body text", number, self.max_depth);
            return false;
        }

        // The number itself is open: keep writing into it
        if let Some(pos) = category.open_position(&number) {
            category.stack.truncate(pos + 1);
            category.append(line);
            return true;
        }

        let Some(parent) = parent_number(&number) else {
            return false;
        };
        let Some(parent_pos) = category.open_position(parent) else {
            debug!("'{}' has no open parent, treating as body text", number);
            return false;
        };
        if category.index.contains_key(&number) {
            debug!("'{}' already closed, treating as body text", number);
            return false;
        }

        category.stack.truncate(parent_pos + 1);
        let parent_idx = category.stack[parent_pos];
        let idx = category.push_node(&number, line);
        category.nodes[parent_idx].children.push(idx);
        category.stack.push(idx);
        true
    }
}

#[derive(Default)]
struct ParseState {
    categories: Vec<CategoryBuilder>,
    current: Option<usize>,
}

impl ParseState {
    fn open_category(&mut self, name: &str, chapter: &str) {
        let idx = match self.categories.iter().position(|c| c.name == name) {
            Some(idx) => {
                debug!("Re-opening category '{}'", name);
                idx
            }
            None => {
                self.categories.push(CategoryBuilder::new(name));
                self.categories.len() - 1
            }
        };

        let category = &mut self.categories[idx];
        category.chapter = chapter.to_string();
        let chapter_idx = match category.index.get(chapter) {
            Some(&existing) => existing,
            None => {
                let created = category.push_node(chapter, "");
                category.roots.push(created);
                created
            }
        };
        category.stack.clear();
        category.stack.push(chapter_idx);
        self.current = Some(idx);
    }

    fn current_category_mut(&mut self) -> Option<&mut CategoryBuilder> {
        self.current.map(|idx| &mut self.categories[idx])
    }

    fn append_body(&mut self, line: &str) {
        match self.current_category_mut() {
            Some(category) => category.append(line),
            None => debug!("Discarding text before first category: '{}'", line),
        }
    }

    fn finish(self) -> ParagraphTree {
        let categories = self
            .categories
            .into_iter()
            .map(CategoryBuilder::build)
            .collect();
        ParagraphTree { categories }
    }
}

struct Node {
    number: String,
    text: String,
    children: Vec<usize>,
}

/// Arena of paragraphs for one category while parsing.
struct CategoryBuilder {
    name: String,
    chapter: String,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
    /// Open paragraphs, outermost (the chapter node) first
    stack: Vec<usize>,
}

impl CategoryBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chapter: String::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn push_node(&mut self, number: &str, text: &str) -> usize {
        self.nodes.push(Node {
            number: number.to_string(),
            text: text.to_string(),
            children: Vec::new(),
        });
        let idx = self.nodes.len() - 1;
        self.index.insert(number.to_string(), idx);
        idx
    }

    fn open_position(&self, number: &str) -> Option<usize> {
        self.stack
            .iter()
            .rposition(|&idx| self.nodes[idx].number == number)
    }

    fn append(&mut self, line: &str) {
        if let Some(&idx) = self.stack.last() {
            let text = &mut self.nodes[idx].text;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
    }

    fn build(self) -> CategoryTree {
        let mut tree = CategoryTree::new(&self.name);
        tree.roots = self
            .roots
            .iter()
            .map(|&idx| build_paragraph(&self.nodes, idx, &self.name))
            .collect();
        tree
    }
}

// Recursion depth is bounded by the parser's maximum nesting depth
fn build_paragraph(nodes: &[Node], idx: usize, category: &str) -> Paragraph {
    let node = &nodes[idx];
    let mut paragraph = Paragraph::new(category, &node.number, node.text.clone());
    paragraph.children = node
        .children
        .iter()
        .map(|&child| build_paragraph(nodes, child, category))
        .collect();
    paragraph
}
