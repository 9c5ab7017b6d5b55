//! Scripted completion client for testing.
//!
//! Provides a [`CompletionClient`] that replays predefined replies in order
//! and captures every request, so orchestration and session tests run
//! without the model router.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{ChatError, ChatResult};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::stream::Completion;
use crate::types::{TokenUsage, ToolCallRequest};

/// One predefined reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Completion(Completion),
    ApiError { status: u16, body: String },
    TransportError(String),
}

impl ScriptedReply {
    /// A plain text answer.
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Completion(Completion {
            content: text.into(),
            finish_reason: Some("stop".to_string()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            ..Completion::default()
        })
    }

    /// A single native tool call.
    pub fn tool_call(id: &str, tool: &str, arguments: &str) -> Self {
        Self::tool_calls(vec![ToolCallRequest::new(id, tool, arguments)])
    }

    /// Several native tool calls in one turn.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self::Completion(Completion {
            tool_calls: calls,
            finish_reason: Some("tool_calls".to_string()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            ..Completion::default()
        })
    }
}

/// Mock model client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<RwLock<VecDeque<ScriptedReply>>>,
    captured_requests: Arc<RwLock<Vec<CompletionRequest>>>,
    failing_models: Arc<RwLock<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reply for the next call.
    pub fn add_reply(self, reply: ScriptedReply) -> Self {
        self.replies.write().push_back(reply);
        self
    }

    /// Make every request to `model` fail with a 503 without using a reply.
    pub fn fail_model(self, model: impl Into<String>) -> Self {
        self.failing_models.write().push(model.into());
        self
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.captured_requests.read().clone()
    }

    /// Models addressed, in call order.
    pub fn requested_models(&self) -> Vec<String> {
        self.captured_requests
            .read()
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_requests.read().len()
    }

    /// Replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.replies.read().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> ChatResult<Completion> {
        self.captured_requests.write().push(request.clone());

        if self.failing_models.read().contains(&request.model) {
            return Err(ChatError::Api {
                status: 503,
                body: format!("{} is unavailable", request.model),
            });
        }

        let reply = self.replies.write().pop_front();
        match reply {
            Some(ScriptedReply::Completion(completion)) => Ok(Completion {
                model: Some(request.model.clone()),
                ..completion
            }),
            Some(ScriptedReply::ApiError { status, body }) => Err(ChatError::Api { status, body }),
            Some(ScriptedReply::TransportError(message)) => Err(ChatError::Transport(message)),
            None => Err(ChatError::MalformedResponse(
                "no scripted reply left".to_string(),
            )),
        }
    }
}
