//! Text normalization for extracted regulatory documents.
//!
//! Both source encodings go through the same pass so that their output can be
//! compared character for character.

use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0B\x0C]+").unwrap());

static TRAILING_LEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*\.{3,}\s*\d*)+\s*$").unwrap());

static CHAPTER_GLUED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"פרק(\d+)").unwrap());

static CHAPTER_TOC_LEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(פרק \d+)\s*\.{3,}\s*([^.\d]+?)\d*\s*$"#).unwrap());

static CHAPTER_DANGLING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(פרק \d+)\s*-\s*['"]*\s*$"#).unwrap());

static CHAPTER_DASH_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(פרק \d+)\s*-\s*(\S)").unwrap());

/// Normalize extracted text. Idempotent: `normalize(normalize(x)) == normalize(x)`.
///
/// The pass is re-applied until the text stops changing. Dropping a line can
/// expose a new hyphen wrap, which only the next pass joins.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let unified = unify_characters(text);
    let lines = reflow_hyphenation(unified.lines().map(str::trim));

    let cleaned: Vec<String> = lines
        .into_iter()
        .filter_map(strip_pagination)
        .map(|line| repair_chapter_header(&line))
        .collect();

    collapse_blank_lines(&cleaned)
}

/// Step 1: character unification and whitespace collapse (lines are trimmed by the caller).
fn unify_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                out.push(' ')
            }
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => {
                out.push('-')
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{05F4}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{05F3}' => out.push('\''),
            '_' => out.push(' '),
            c if is_bidi_control(c) => {}
            c => out.push(c),
        }
    }
    HORIZONTAL_WS.replace_all(&out, " ").into_owned()
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{061C}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
    )
}

pub(crate) fn is_hebrew_letter(c: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

/// Step 2: join `word-\nword` wraps when a Hebrew letter sits on both sides.
fn reflow_hyphenation<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut joining = false;
    for line in lines {
        if joining && line.chars().next().is_some_and(is_hebrew_letter) {
            if let Some(last) = out.last_mut() {
                last.pop();
                last.push_str(line);
            }
        } else {
            out.push(line.to_string());
        }
        joining = out.last().is_some_and(|last| ends_with_broken_word(last));
    }
    out
}

fn ends_with_broken_word(line: &str) -> bool {
    let mut tail = line.chars().rev();
    matches!(tail.next(), Some('-') | Some('־')) && tail.next().is_some_and(is_hebrew_letter)
}

/// Step 3: drop page numbers and dotted leaders. `None` removes the line.
fn strip_pagination(line: String) -> Option<String> {
    if is_page_number(&line) {
        return None;
    }
    if line.contains("...") {
        if line.chars().all(|c| c == '.' || c == ' ') {
            return None;
        }
        let trimmed = TRAILING_LEADER.replace(&line, "");
        if trimmed.len() != line.len() {
            let trimmed = trimmed.trim();
            // A leader chain of page numbers leaves only the first one behind
            return (!trimmed.is_empty() && !is_page_number(trimmed)).then(|| trimmed.to_string());
        }
    }
    Some(line)
}

fn is_page_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Step 4: repair chapter headers mangled by PDF extraction.
fn repair_chapter_header(line: &str) -> String {
    if !line.contains("פרק") {
        return line.to_string();
    }

    let unquoted = line.trim_matches(|c| c == '\'' || c == '"').trim();
    let mut header = CHAPTER_GLUED.replace_all(unquoted, "פרק ${1}").into_owned();
    if !header.starts_with("פרק ") {
        return header;
    }

    header = CHAPTER_TOC_LEADER
        .replace(&header, "${1} - ${2}")
        .trim()
        .to_string();
    header = CHAPTER_DANGLING_DASH.replace(&header, "${1}").into_owned();
    header = CHAPTER_DASH_SPACING
        .replace(&header, "${1} - ${2}")
        .into_owned();
    HORIZONTAL_WS.replace_all(header.trim(), " ").into_owned()
}

fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.is_empty() && out.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
