//! Structured-output validation for model replies.
//!
//! Models are asked for a list but answer in many shapes: a JSON array, a
//! JSON object wrapping an array, a numbered or bulleted list, a fenced code
//! block, or one bare line. Every shape is normalized into a list of trimmed,
//! non-empty strings before the bounds of a [`ListSchema`] are checked.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Bounds for a list-of-strings reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSchema {
    pub min: usize,
    pub max: usize,
}

/// Search queries: 2 to 5.
pub const QUERY_SCHEMA: ListSchema = ListSchema { min: 2, max: 5 };

/// Key findings: 1 to 5.
pub const FINDINGS_SCHEMA: ListSchema = ListSchema { min: 1, max: 5 };

/// A reply that could not be coerced into its schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("model reply contained no usable items")]
    Empty,

    #[error("expected at least {min} items, found {found}")]
    TooFew { found: usize, min: usize },
}

/// Normalize `raw` and check it against `schema`.
///
/// Replies with more than `schema.max` items are truncated in order; replies
/// with fewer than `schema.min` are rejected.
pub fn parse_list(raw: &str, schema: ListSchema) -> Result<Vec<String>, SchemaViolation> {
    let mut items = normalize_items(raw);

    if items.is_empty() {
        return Err(SchemaViolation::Empty);
    }
    if items.len() < schema.min {
        return Err(SchemaViolation::TooFew {
            found: items.len(),
            min: schema.min,
        });
    }
    if items.len() > schema.max {
        debug!(found = items.len(), max = schema.max, "truncating list reply");
        items.truncate(schema.max);
    }

    Ok(items)
}

/// Turn any supported reply shape into a list of cleaned strings.
pub fn normalize_items(raw: &str) -> Vec<String> {
    let body = strip_code_fence(raw.trim());

    let from_json = json_span(body)
        .and_then(|span| serde_json::from_str::<Value>(span).ok())
        .and_then(|value| items_from_json(&value));
    if let Some(items) = from_json {
        return clean(items);
    }

    clean(items_from_text(body))
}

// ---------------------------------------------------------------------------
// JSON shapes
// ---------------------------------------------------------------------------

/// The JSON candidate in `body`: the whole body if it opens like JSON,
/// otherwise the span from the first line opening with `[` or `{` to the
/// last matching closer. Brackets inside prose lines are never candidates.
fn json_span(body: &str) -> Option<&str> {
    if body.starts_with('"') {
        return Some(body);
    }

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let closer = match line.trim_start().chars().next() {
            Some('[') => ']',
            Some('{') => '}',
            _ => {
                offset += line.len();
                continue;
            }
        };
        let start = offset + indent;
        let end = body.rfind(closer).filter(|&end| end > start)?;
        return Some(&body[start..=end]);
    }

    None
}

/// Keys checked first when the reply is a JSON object.
const LIST_KEYS: &[&str] = &["queries", "findings", "key_findings", "items", "results"];

fn items_from_json(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(values) => Some(
            values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        Value::Object(map) => LIST_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .chain(map.values())
            .find(|v| v.is_array())
            // A bare string under a list key stands in for a one-item list.
            .or_else(|| {
                LIST_KEYS
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find(|v| v.is_string())
            })
            .and_then(items_from_json),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Text shapes
// ---------------------------------------------------------------------------

/// The contents of the first fenced block, wherever it sits in the reply.
fn strip_code_fence(body: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?[ \t]*```").expect("valid regex")
    });

    match FENCE_RE.captures(body).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => body,
    }
}

/// Matches a leading bullet (`-`, `*`, `+`, `•`) or number marker (`1.`, `2)`, `(3)`).
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+•]|\(?\d{1,3}[.):])\s+").expect("valid regex")
});

/// A line holding nothing but a fence marker, e.g. from an unclosed block.
static FENCE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*\s*$").expect("valid regex"));

/// Lines of a list reply. When some lines carry list markers, unmarked lines
/// (preambles such as "Here are the queries:") are dropped.
fn items_from_text(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body
        .lines()
        .filter(|l| !l.trim().is_empty() && !FENCE_LINE_RE.is_match(l))
        .collect();
    let any_marked = lines.iter().any(|l| MARKER_RE.is_match(l));

    lines
        .into_iter()
        .filter(|l| !any_marked || MARKER_RE.is_match(l))
        .map(|l| MARKER_RE.replace(l, "").into_owned())
        .collect()
}

/// Trim whitespace, stray quotes, and trailing commas; drop items with no
/// alphanumeric content (leftover brackets from half-formed JSON).
fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| {
            item.trim()
                .trim_end_matches(',')
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|item| item.chars().any(char::is_alphanumeric))
        .collect()
}
