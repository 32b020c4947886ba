//! JSON extraction from free-text model completions.
//!
//! Models wrap their answers in prose, markdown fences or both, so the
//! payload has to be fished out of the text. Extraction runs in two
//! stages: a strict scan that takes the first structurally balanced
//! object or array that parses, then one looser pass from the first
//! opener to the last matching closer before giving up.

use restock_protocols::EngineError;
use serde_json::Value;

const ERROR_SNIPPET_LEN: usize = 120;

/// Which bracket kind to hunt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn opener(self) -> char {
        match self {
            JsonShape::Object => '{',
            JsonShape::Array => '[',
        }
    }

    fn closer(self) -> char {
        match self {
            JsonShape::Object => '}',
            JsonShape::Array => ']',
        }
    }
}

/// Extract the first JSON value of the given shape from `text`.
pub fn extract_json(text: &str, shape: JsonShape) -> Result<Value, EngineError> {
    if let Some(value) = scan_balanced(text, shape) {
        return Ok(value);
    }
    if let Some(value) = loose_boundaries(text, shape) {
        return Ok(value);
    }
    Err(EngineError::Parse(snippet(text)))
}

/// Stage one: for every opener, find its matching closer while honouring
/// string literals and escapes, and accept the first span serde can parse.
/// Spans that balance but fail to parse are skipped, not fatal.
fn scan_balanced(text: &str, shape: JsonShape) -> Option<Value> {
    let chars: Vec<char> = text.chars().collect();
    for (start, &c) in chars.iter().enumerate() {
        if c != shape.opener() {
            continue;
        }
        if let Some(end) = balanced_end(&chars, start, shape) {
            let candidate: String = chars[start..=end].iter().collect();
            if let Ok(value) = serde_json::from_str(&candidate) {
                return Some(value);
            }
        }
    }
    None
}

fn balanced_end(chars: &[char], start: usize, shape: JsonShape) -> Option<usize> {
    let open = shape.opener();
    let close = shape.closer();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &c) in chars[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }
    None
}

/// Stage two: first opener to last closer of the same kind. Catches
/// completions whose interior defeats the strict scanner.
fn loose_boundaries(text: &str, shape: JsonShape) -> Option<Value> {
    let start = text.find(shape.opener())?;
    let end = text.rfind(shape.closer())?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= ERROR_SNIPPET_LEN {
        return trimmed.to_string();
    }
    let mut cut = ERROR_SNIPPET_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
