//! Tool calls written into the message text.
//!
//! Some routed models do not use the native tool-call channel and instead
//! write calls in brackets:
//!
//! ```text
//! [functions.get_providers]
//! [get_regions(provider="aws")]
//! [get_providers]
//! ```
//!
//! The `functions.` form wins when present, then the form with an argument
//! list. Bare `[name]` is only considered when neither matched. Only
//! registered tool names count; anything else stays in the text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::ToolRegistry;
use crate::types::ToolCallRequest;

/// Calls parsed out of a text, and the text without them.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCalls {
    pub calls: Vec<ToolCallRequest>,
    pub content: String,
}

fn pattern(cell: &'static OnceLock<Option<Regex>>, src: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(src).ok()).as_ref()
}

fn namespaced() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&CELL, r"\[functions\.(\w+)(?:\([^)]*\))?\]")
}

fn with_arguments() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&CELL, r"\[(\w+)\(([^)]*)\)\]")
}

fn bare() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&CELL, r"\[(\w+)(?:\(\))?\]")
}

fn argument_pair() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(
        &CELL,
        r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|(-?\d+(?:\.\d+)?))"#,
    )
}

/// Parse bracketed tool calls out of `content`.
///
/// Returns `None` when the text holds no call to a registered tool.
pub fn parse_inline_calls(content: &str, registry: &ToolRegistry) -> Option<InlineCalls> {
    let forms: [(Option<&'static Regex>, bool); 2] =
        [(namespaced(), false), (with_arguments(), true)];

    for (re, has_arguments) in forms {
        let Some(re) = re else { continue };
        if let Some(parsed) = collect(re, content, registry, has_arguments) {
            return Some(parsed);
        }
    }

    // `[name]` alone also matches ordinary bracketed prose, so it is the last resort.
    bare().and_then(|re| collect(re, content, registry, false))
}

fn collect(
    re: &Regex,
    content: &str,
    registry: &ToolRegistry,
    has_arguments: bool,
) -> Option<InlineCalls> {
    // Ids must stay unique across turns of one thread.
    let batch = uuid::Uuid::new_v4().simple().to_string();
    let mut calls = Vec::new();
    let mut cleaned = String::with_capacity(content.len());
    let mut last = 0;

    for captures in re.captures_iter(content) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if !registry.is_registered(name.as_str()) {
            continue;
        }

        let arguments = if has_arguments {
            captures
                .get(2)
                .map(|args| parse_argument_list(args.as_str()))
                .unwrap_or_default()
        } else {
            Map::new()
        };

        calls.push(ToolCallRequest::new(
            format!("call_{}_{}", batch, calls.len()),
            name.as_str(),
            Value::Object(arguments).to_string(),
        ));
        cleaned.push_str(&content[last..whole.start()]);
        last = whole.end();
    }

    if calls.is_empty() {
        return None;
    }
    cleaned.push_str(&content[last..]);

    Some(InlineCalls {
        calls,
        content: cleaned.trim().to_string(),
    })
}

/// `provider="aws", quantity=2` into an object; numbers stay numbers.
fn parse_argument_list(list: &str) -> Map<String, Value> {
    let mut arguments = Map::new();
    let Some(re) = argument_pair() else {
        return arguments;
    };

    for captures in re.captures_iter(list) {
        let Some(key) = captures.get(1) else { continue };
        let value = if let Some(text) = captures.get(2).or_else(|| captures.get(3)) {
            Value::String(text.as_str().to_string())
        } else if let Some(number) = captures.get(4) {
            serde_json::from_str(number.as_str())
                .unwrap_or_else(|_| Value::String(number.as_str().to_string()))
        } else {
            continue;
        };
        arguments.insert(key.as_str().to_string(), value);
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(call: &ToolCallRequest) -> Value {
        serde_json::from_str(&call.raw_arguments).unwrap()
    }

    #[test]
    fn test_call_ids_unique_across_parses() {
        let registry = ToolRegistry::new();
        let first =
            parse_inline_calls("[get_providers] [get_regions(provider=\"aws\")]", &registry).unwrap();
        let second = parse_inline_calls("[get_providers]", &registry).unwrap();

        assert_eq!(first.calls.len(), 2);
        assert_ne!(first.calls[0].id, first.calls[1].id);
        assert!(first.calls.iter().all(|c| c.id.starts_with("call_")));
        assert!(first.calls.iter().all(|c| c.id != second.calls[0].id));
    }

    #[test]
    fn test_namespaced_form() {
        let registry = ToolRegistry::new();
        let parsed =
            parse_inline_calls("Let me look. [functions.get_providers]", &registry).unwrap();

        assert_eq!(parsed.calls.len(), 1);
        assert_eq!(parsed.calls[0].tool_name, "get_providers");
        assert_eq!(args(&parsed.calls[0]), json!({}));
        assert_eq!(parsed.content, "Let me look.");
    }

    #[test]
    fn test_argument_form() {
        let registry = ToolRegistry::new();
        let parsed = parse_inline_calls(
            r#"[search_resources(provider="aws", region='us-east-1', query="t2")] one moment"#,
            &registry,
        )
        .unwrap();

        assert_eq!(parsed.calls[0].tool_name, "search_resources");
        assert_eq!(
            args(&parsed.calls[0]),
            json!({"provider": "aws", "region": "us-east-1", "query": "t2"})
        );
        assert_eq!(parsed.content, "one moment");
    }

    #[test]
    fn test_numeric_arguments() {
        let registry = ToolRegistry::new();
        let parsed = parse_inline_calls(
            r#"[add_to_cart(provider="aws", quantity=2, pricePerUnit=0.0116)]"#,
            &registry,
        )
        .unwrap();
        let value = args(&parsed.calls[0]);
        assert_eq!(value["quantity"], 2);
        assert_eq!(value["pricePerUnit"].as_f64(), Some(0.0116));
    }

    #[test]
    fn test_bare_form_only_as_last_resort() {
        let registry = ToolRegistry::new();
        let parsed = parse_inline_calls("[get_providers]", &registry).unwrap();
        assert_eq!(parsed.calls[0].tool_name, "get_providers");
        assert_eq!(parsed.content, "");

        // When an argument form is present, the bare form is not considered.
        let parsed = parse_inline_calls(
            r#"[get_regions(provider="gcp")] then [get_providers]"#,
            &registry,
        )
        .unwrap();
        assert_eq!(parsed.calls.len(), 1);
        assert_eq!(parsed.calls[0].tool_name, "get_regions");
        assert_eq!(parsed.content, "then [get_providers]");
    }

    #[test]
    fn test_unregistered_names_are_prose() {
        let registry = ToolRegistry::new();
        assert!(parse_inline_calls("See [note] and [launch_rocket()]", &registry).is_none());
        assert!(parse_inline_calls("plain answer", &registry).is_none());
    }
}
