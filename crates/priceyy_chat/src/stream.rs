//! Accumulation of streamed chat-completion chunks.
//!
//! An OpenAI-compatible stream delivers `data:` lines, each carrying a chunk
//! with content deltas and tool-call fragments. Tool-call fragments are keyed
//! by `index`: the id and name arrive once, the argument text arrives in
//! pieces. The stream ends with `data: [DONE]` or a chunk carrying a
//! `finish_reason`.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::repair::split_concatenated_objects;
use crate::types::{TokenUsage, ToolCallRequest};

/// A complete model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
    /// Model that actually answered, when the router reports it
    pub model: Option<String>,
}

impl Completion {
    /// Build a completion from a non-streamed response body.
    pub fn from_response(body: &Value) -> ChatResult<Self> {
        if let Some(error) = body.get("error") {
            return Err(router_error(error));
        }

        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| ChatError::MalformedResponse("response has no choices".to_string()))?;
        let message = choice.get("message").unwrap_or(&Value::Null);

        let mut accumulator = StreamAccumulator::new();
        accumulator.model = body.get("model").and_then(Value::as_str).map(str::to_string);
        if let Some(usage) = body.get("usage") {
            accumulator.usage = parse_usage(usage);
        }
        if let Some(content) = message.get("content").and_then(Value::as_str) {
            accumulator.content.push_str(content);
        }
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for (position, call) in calls.iter().enumerate() {
                accumulator.merge_tool_call(position, call);
            }
        }
        accumulator.finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string);
        accumulator.done = true;

        Ok(accumulator.finish())
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Assembles a [`Completion`] from streamed chunks.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: TokenUsage,
    model: Option<String>,
    done: bool,
    chunks: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of the SSE body.
    ///
    /// Blank lines, comments and `event:` lines are ignored.
    pub fn push_line(&mut self, line: &str) -> ChatResult<()> {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        match serde_json::from_str::<Value>(data) {
            Ok(chunk) => self.push_chunk(&chunk),
            Err(e) => {
                warn!(error = %e, data, "Skipping unparseable stream chunk");
                Ok(())
            }
        }
    }

    /// Feed one decoded chunk.
    pub fn push_chunk(&mut self, chunk: &Value) -> ChatResult<()> {
        if let Some(error) = chunk.get("error") {
            return Err(router_error(error));
        }
        self.chunks += 1;

        if self.model.is_none() {
            self.model = chunk.get("model").and_then(Value::as_str).map(str::to_string);
        }
        if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
            self.usage = parse_usage(usage);
        }

        let choices = chunk.get("choices").and_then(Value::as_array);
        for choice in choices.into_iter().flatten() {
            let delta = choice.get("delta").unwrap_or(&Value::Null);
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                self.content.push_str(text);
            }
            if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for (position, call) in calls.iter().enumerate() {
                    let index = call
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|i| i as usize)
                        .unwrap_or(position);
                    self.merge_tool_call(index, call);
                }
            }
            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                self.finish_reason = Some(reason.to_string());
            }
        }
        Ok(())
    }

    fn merge_tool_call(&mut self, index: usize, call: &Value) {
        let partial = self.calls.entry(index).or_default();
        if let Some(id) = call.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            partial.id = Some(id.to_string());
        }
        let function = call.get("function").unwrap_or(&Value::Null);
        if let Some(name) = function.get("name").and_then(Value::as_str) {
            if partial.name.is_empty() {
                partial.name = name.to_string();
            } else if partial.name != name {
                partial.name.push_str(name);
            }
        }
        match function.get("arguments") {
            Some(Value::String(piece)) => partial.arguments.push_str(piece),
            // Some routers send the arguments already decoded.
            Some(value @ Value::Object(_)) => partial.arguments.push_str(&value.to_string()),
            _ => {}
        }
    }

    /// Whether the stream signalled its end.
    pub fn is_complete(&self) -> bool {
        self.done || self.finish_reason.is_some()
    }

    /// Whether nothing usable has arrived.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.calls.is_empty()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Produce the completion.
    ///
    /// A tool-call buffer holding several objects written back to back is
    /// split into independent calls.
    pub fn finish(self) -> Completion {
        let mut tool_calls = Vec::new();

        for (index, partial) in self.calls {
            if partial.name.is_empty() {
                warn!(index, "Dropping tool call fragment without a name");
                continue;
            }
            let id = partial
                .id
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

            let pieces = split_concatenated_objects(&partial.arguments);
            if pieces.len() > 1 {
                debug!(
                    tool = %partial.name,
                    count = pieces.len(),
                    "Split concatenated tool-call arguments"
                );
            }
            for (n, arguments) in pieces.into_iter().enumerate() {
                let call_id = if n == 0 {
                    id.clone()
                } else {
                    format!("{}_{}", id, n)
                };
                tool_calls.push(ToolCallRequest::new(call_id, partial.name.clone(), arguments));
            }
        }

        Completion {
            content: self.content,
            tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
            model: self.model,
        }
    }
}

fn parse_usage(usage: &Value) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}

/// Map an `error` object embedded in a 200 response.
fn router_error(error: &Value) -> ChatError {
    let status = error
        .get("code")
        .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(502);
    let body = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    ChatError::Api { status, body }
}
