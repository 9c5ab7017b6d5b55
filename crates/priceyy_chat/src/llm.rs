//! Chat-completion client for the model router.
//!
//! OpenRouter speaks the OpenAI chat-completions wire format:
//! `POST {base}/chat/completions` with bearer auth. Responses are either a
//! single completion object or a server-sent event stream.

use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::stream::{Completion, StreamAccumulator};
use crate::types::{Message, MessageRole};

/// A request for one model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    /// Tool entries in wire format
    pub tools: Vec<Value>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl CompletionRequest {
    /// The same request addressed to another model.
    pub fn for_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// JSON body sent to the router.
    pub fn to_wire(&self) -> Value {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": self.system_prompt }));
        }
        messages.extend(self.messages.iter().map(wire_message));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": self.stream,
        });
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools.clone());
        }
        body
    }
}

fn wire_message(message: &Message) -> Value {
    match message.role {
        MessageRole::User => json!({ "role": "user", "content": message.content }),
        MessageRole::Assistant if message.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": message.content })
        }
        MessageRole::Assistant => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.tool_name, "arguments": call.raw_arguments }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
    }
}

/// Something that can answer one model turn.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> ChatResult<Completion>;
}

/// reqwest-backed client for OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from resolved configuration.
    pub fn from_config(config: &ChatConfig) -> ChatResult<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(config.base_url.clone(), api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &CompletionRequest) -> ChatResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %request.model, messages = request.messages.len(), "Calling model router");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Priceyy")
            .json(&request.to_wire())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), model = %request.model, "Model router returned an error");
            return Err(ChatError::Api {
                status: status.as_u16(),
                body: error_body(&body),
            });
        }
        Ok(response)
    }

    async fn read_stream(
        &self,
        response: reqwest::Response,
        model: &str,
    ) -> ChatResult<Completion> {
        let started = Instant::now();
        info!(model, "Stream started");

        let mut accumulator = StreamAccumulator::new();
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = stream.next().await {
            for line in lines.push(&chunk?) {
                accumulator.push_line(line.trim_end())?;
            }
        }
        if let Some(rest) = lines.finish() {
            accumulator.push_line(rest.trim_end())?;
        }

        if !accumulator.is_complete() {
            if accumulator.is_empty() {
                return Err(ChatError::MalformedResponse(
                    "stream ended before any content arrived".to_string(),
                ));
            }
            warn!(model, "Stream ended without a completion marker");
        }

        info!(
            model,
            chunks = accumulator.chunk_count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Stream ended"
        );
        Ok(accumulator.finish())
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> ChatResult<Completion> {
        let response = self.send(request).await?;

        if request.stream {
            return self.read_stream(response, &request.model).await;
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;
        Completion::from_response(&body)
    }
}

/// Splits a byte stream into lines, decoding only whole lines so a
/// multi-byte character cut between chunks stays intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left after the last newline.
    fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

/// Pull the message out of an error body such as `{"error":{"message":..}}`.
fn error_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .and_then(Value::as_str);
        if let Some(message) = message {
            return message.to_string();
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolCallRequest, ToolResult};

    fn request(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: "openai/gpt-oss-20b:free".to_string(),
            system_prompt: "You are a pricing assistant.".to_string(),
            messages,
            tools: vec![json!({"type": "function", "function": {"name": "get_providers"}})],
            max_tokens: 4096,
            temperature: 0.7,
            stream: true,
        }
    }

    #[test]
    fn test_wire_format() {
        let call = ToolCallRequest::new("call_1", "get_providers", "{}");
        let body = request(vec![
            Message::user("What providers are there?"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool(&ToolResult::ok("call_1", json!(["aws", "gcp"]))),
        ])
        .to_wire();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "get_providers");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_for_model_keeps_everything_else() {
        let original = request(vec![Message::user("hi")]);
        let retargeted = original.for_model("qwen/qwen3-coder:free");
        assert_eq!(retargeted.model, "qwen/qwen3-coder:free");
        assert_eq!(retargeted.messages, original.messages);
    }

    #[test]
    fn test_line_buffer_keeps_split_multibyte_chars() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"5 €\"}}]}\n".as_bytes();
        let euro = line.iter().position(|&b| b == 0xE2).unwrap();

        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&line[..euro + 2]).is_empty());
        let lines = buffer.push(&line[euro + 2..]);

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("5 €"));
        assert!(!lines[0].contains('\u{FFFD}'));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_returns_unterminated_tail() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push(b"data: one\ndata: tw");
        assert_eq!(lines, vec!["data: one\n".to_string()]);
        assert!(buffer.push(b"o").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: two"));
    }

    #[test]
    fn test_error_body_extraction() {
        assert_eq!(
            error_body(r#"{"error":{"message":"No endpoints found","code":404}}"#),
            "No endpoints found"
        );
        assert_eq!(error_body("Bad gateway\n"), "Bad gateway");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = ChatConfig::default();
        assert!(matches!(
            OpenRouterClient::from_config(&config),
            Err(ChatError::LlmNotConfigured)
        ));

        let client = OpenRouterClient::from_config(&config.with_api_key("sk-test")).unwrap();
        assert_eq!(client.base_url(), "https://openrouter.ai/api/v1");
    }
}
