//! Core types for the cost assistant chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation thread
pub type ThreadId = String;

/// Longest title derived from a first message.
const MAX_TITLE_CHARS: usize = 50;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// A model-requested invocation of a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "toolName")]
    pub tool_name: String,
    /// Argument text exactly as the model produced it; may be malformed JSON
    #[serde(rename = "rawArguments")]
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }
}

/// Outcome of one tool call, paired with the request by `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The `{success, data | error}` envelope handed back to the model.
    pub fn envelope(&self) -> serde_json::Value {
        match (&self.data, &self.error) {
            (_, Some(error)) if !self.success => {
                serde_json::json!({ "success": false, "error": error })
            }
            (Some(data), _) => serde_json::json!({ "success": self.success, "data": data }),
            _ => serde_json::json!({ "success": self.success }),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Call answered by this message (tool messages only)
    #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Calls requested by this message (assistant messages only)
    #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// When the message was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            tool_call_id: None,
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content.into())
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut message = Self::with_role(MessageRole::Assistant, content.into());
        message.tool_calls = calls;
        message
    }

    /// Create the tool message carrying a result
    pub fn tool(result: &ToolResult) -> Self {
        let mut message = Self::with_role(MessageRole::Tool, result.envelope().to_string());
        message.tool_call_id = Some(result.tool_call_id.clone());
        message
    }

    /// Whether the message belongs in the user-facing transcript.
    ///
    /// Tool results and assistant turns that only carry tool calls stay in
    /// the model history but are hidden from the user.
    pub fn is_visible(&self) -> bool {
        match self.role {
            MessageRole::Tool => false,
            MessageRole::Assistant => {
                self.tool_calls.is_empty() || !self.content.trim().is_empty()
            }
            MessageRole::User => true,
        }
    }
}

/// A persisted conversation.
///
/// Messages can only be appended; the sequence is exposed read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    /// Last activity
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Thread {
    /// Create an empty thread
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            timestamp: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Create a thread titled after its first user message
    pub fn for_first_message(content: &str) -> Self {
        Self::new(title_from(content))
    }

    /// Rebuild a thread from stored parts
    pub fn from_parts(
        id: ThreadId,
        title: String,
        timestamp: DateTime<Utc>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            id,
            title,
            timestamp,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.timestamp = Utc::now();
        self.messages.push(message);
    }

    /// The transcript as shown to the user
    pub fn visible_messages(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.is_visible()).collect()
    }

    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            timestamp: self.timestamp,
            message_count: self.messages.len(),
        }
    }
}

/// Derive a thread title from a message: first line, at most 50 characters.
pub fn title_from(content: &str) -> String {
    let first_line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if first_line.is_empty() {
        return "New conversation".to_string();
    }
    if first_line.chars().count() <= MAX_TITLE_CHARS {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

/// Summary of a thread for listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
}

/// Token usage reported by the model router
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Response from sending a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(rename = "threadId")]
    pub thread_id: ThreadId,
    /// The assistant's reply
    pub reply: Message,
    /// Visible transcript after the round
    pub transcript: Vec<Message>,
    /// Whether a fallback model answered any turn of the round
    #[serde(rename = "fallbackActive")]
    pub fallback_active: bool,
    /// Model that produced the final turn
    pub model: String,
    /// Number of model turns used
    pub turns: usize,
    /// Whether the round was cut off by the turn limit
    #[serde(rename = "hitTurnLimit")]
    pub hit_turn_limit: bool,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Hello");

        let msg = Message::assistant("Hi there!");
        assert_eq!(msg.role, MessageRole::Assistant);
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_message_carries_envelope() {
        let result = ToolResult::err("call_1", "unsupported tool: launch_rocket");
        let msg = Message::tool(&result);

        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        let envelope: serde_json::Value = serde_json::from_str(&msg.content).unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"], "unsupported tool: launch_rocket");
    }

    #[test]
    fn test_visibility_rules() {
        let call = ToolCallRequest::new("call_1", "get_providers", "{}");
        assert!(Message::user("hi").is_visible());
        assert!(Message::assistant("answer").is_visible());
        assert!(!Message::assistant_tool_calls("", vec![call.clone()]).is_visible());
        assert!(Message::assistant_tool_calls("Let me check.", vec![call]).is_visible());
        assert!(!Message::tool(&ToolResult::ok("call_1", serde_json::json!([]))).is_visible());
    }

    #[test]
    fn test_thread_append_only() {
        let mut thread = Thread::for_first_message("How much is a t2.micro?");
        assert_eq!(thread.title, "How much is a t2.micro?");

        let before = thread.timestamp;
        thread.push(Message::user("How much is a t2.micro?"));
        thread.push(Message::tool(&ToolResult::ok("c", serde_json::json!({}))));
        thread.push(Message::assistant("About $8.47/month."));

        assert_eq!(thread.len(), 3);
        assert!(thread.timestamp >= before);
        assert_eq!(thread.visible_messages().len(), 2);
    }

    #[test]
    fn test_title_truncation() {
        let long = "a".repeat(80);
        let title = title_from(&long);
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));

        assert_eq!(title_from("\n\n  second line wins\nthird"), "second line wins");
        assert_eq!(title_from("   "), "New conversation");
    }

    #[test]
    fn test_message_wire_format() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![ToolCallRequest::new("call_1", "get_regions", r#"{"provider":"aws"}"#)],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["toolCalls"][0]["toolName"], "get_regions");
        assert!(json.get("toolCallId").is_none());
    }
}
