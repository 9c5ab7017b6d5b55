//! Recovery of malformed tool-call arguments.
//!
//! Routed models regularly emit argument text that is not valid JSON:
//! fragments of two calls glued together by the stream, trailing commas,
//! single quotes, unquoted keys, or a truncated object. Recovery runs in
//! stages and stops at the first one that yields an object:
//!
//! 1. direct parse
//! 2. textual repairs, then parse
//! 3. per-field extraction of the known argument names
//!
//! The heuristics are best-effort. Whatever comes out is still validated
//! against the tool's schema before anything runs.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Argument names the extraction stage looks for.
const STRING_FIELDS: &[&str] = &[
    "provider",
    "region",
    "query",
    "resourceType",
    "priceModel",
    "unitOfMeasure",
];

/// Argument names coerced to numbers during extraction.
const NUMBER_FIELDS: &[&str] = &["pricePerUnit", "quantity", "usage"];

/// Stage that produced the arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    Direct,
    Repaired,
    Extracted,
}

/// Arguments recovered from raw model output.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredArgs {
    pub value: Value,
    pub stage: RecoveryStage,
    /// Further objects that were glued after the first one and dropped
    pub dropped_objects: usize,
}

/// Nothing usable could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed arguments: {0}")]
pub struct MalformedArguments(pub String);

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn trailing_comma() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r",\s*([}\]])")
}

fn single_quoted() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r#"'([^'\\"]*)'"#)
}

fn unquoted_key() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:")
}

fn code_fence() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$")
}

/// Recover an argument object from raw model output.
///
/// An empty payload is an empty object. Valid JSON objects come back
/// unchanged.
pub fn recover_arguments(raw: &str) -> Result<RecoveredArgs, MalformedArguments> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(RecoveredArgs {
            value: Value::Object(Map::new()),
            stage: RecoveryStage::Direct,
            dropped_objects: 0,
        });
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match value {
            Value::Object(_) => {
                return Ok(RecoveredArgs {
                    value,
                    stage: RecoveryStage::Direct,
                    dropped_objects: 0,
                })
            }
            // Double-encoded: the object arrived as a JSON string.
            Value::String(inner) if inner.trim_start().starts_with('{') => {
                return recover_arguments(&inner).map(|mut recovered| {
                    if recovered.stage == RecoveryStage::Direct {
                        recovered.stage = RecoveryStage::Repaired;
                    }
                    recovered
                });
            }
            Value::Null => {
                return Ok(RecoveredArgs {
                    value: Value::Object(Map::new()),
                    stage: RecoveryStage::Direct,
                    dropped_objects: 0,
                })
            }
            other => {
                return Err(MalformedArguments(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )))
            }
        }
    }

    if let Some(recovered) = repair(trimmed) {
        return Ok(recovered);
    }

    let extracted = extract_fields(trimmed);
    if !extracted.is_empty() {
        return Ok(RecoveredArgs {
            value: Value::Object(extracted),
            stage: RecoveryStage::Extracted,
            dropped_objects: 0,
        });
    }

    Err(MalformedArguments(format!(
        "no recognizable fields in {}",
        preview(trimmed)
    )))
}

fn repair(raw: &str) -> Option<RecoveredArgs> {
    let mut text = raw.to_string();

    if let Some(re) = code_fence() {
        if let Some(inner) = re.captures(&text).and_then(|c| c.get(1)) {
            text = inner.as_str().to_string();
        }
    }

    let objects = split_concatenated_objects(&text);
    let dropped_objects = objects.len().saturating_sub(1);
    if let Some(first) = objects.into_iter().next() {
        text = first;
    }

    for fix in [fix_quotes, fix_keys, fix_trailing_commas, close_unbalanced] {
        text = fix(&text);
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text) {
            return Some(RecoveredArgs {
                value,
                stage: RecoveryStage::Repaired,
                dropped_objects,
            });
        }
    }
    None
}

fn fix_quotes(text: &str) -> String {
    match single_quoted() {
        Some(re) => re.replace_all(text, "\"$1\"").into_owned(),
        None => text.to_string(),
    }
}

fn fix_keys(text: &str) -> String {
    match unquoted_key() {
        Some(re) => re.replace_all(text, "$1\"$2\":").into_owned(),
        None => text.to_string(),
    }
}

fn fix_trailing_commas(text: &str) -> String {
    match trailing_comma() {
        Some(re) => re.replace_all(text, "$1").into_owned(),
        None => text.to_string(),
    }
}

/// Close a truncated object: terminate an open string and add missing braces.
fn close_unbalanced(text: &str) -> String {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }

    let mut closed = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        closed.push('"');
    }
    for _ in 0..depth.max(0) {
        closed.push('}');
    }
    closed
}

/// Split text made of several JSON objects written back to back.
///
/// `{"a":1}{"b":2}` becomes two strings. Anything that is not a clean
/// sequence of top-level objects comes back as a single element.
pub fn split_concatenated_objects(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;

    for (i, c) in trimmed.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(trimmed[s..=i].to_string());
                    }
                }
            }
            c if depth == 0 && (c.is_whitespace() || c == ',') => {}
            _ if depth == 0 => return vec![trimmed.to_string()],
            _ => {}
        }
    }

    if depth != 0 || objects.len() < 2 {
        return vec![trimmed.to_string()];
    }
    objects
}

/// Pull known `name: value` pairs out of text that is not JSON at all.
fn extract_fields(text: &str) -> Map<String, Value> {
    let mut fields = Map::new();

    for (name, re) in field_patterns() {
        let Some(raw) = find_field(text, re) else {
            continue;
        };
        if NUMBER_FIELDS.contains(name) {
            if let Some(number) = coerce_number(&raw) {
                fields.insert(name.to_string(), Value::Number(number));
            }
        } else if !raw.is_empty() {
            fields.insert(name.to_string(), Value::String(raw));
        }
    }
    fields
}

/// One compiled `name: value` pattern per known field, built once.
fn field_patterns() -> &'static [(&'static str, Regex)] {
    static CELL: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CELL.get_or_init(|| {
        STRING_FIELDS
            .iter()
            .chain(NUMBER_FIELDS)
            .filter_map(|&name| {
                let pattern = format!(
                    r#"["']?\b{}\b["']?\s*[:=]\s*(?:"([^"]*)"|'([^']*)'|([^,}}\s"']+))"#,
                    regex::escape(name)
                );
                Regex::new(&pattern).ok().map(|re| (name, re))
            })
            .collect()
    })
}

fn find_field(text: &str, re: &Regex) -> Option<String> {
    let captures = re.captures(text)?;
    (1..=3)
        .find_map(|i| captures.get(i))
        .map(|m| m.as_str().trim().to_string())
}

fn coerce_number(raw: &str) -> Option<Number> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    if let Ok(int) = cleaned.parse::<u64>() {
        return Some(Number::from(int));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        format!("'{}'", text)
    } else {
        format!("'{}...'", text.chars().take(MAX).collect::<String>())
    }
}
