//! One model turn.
//!
//! The turn controller sends the conversation to the model with the tool
//! registry attached and classifies the answer as either a plain answer or a
//! set of tool calls. Calls written into the text in bracket form are
//! recognized when the model used no native tool calls.

use std::sync::Arc;

use tracing::debug;

use crate::config::ChatConfig;
use crate::error::ChatResult;
use crate::fallback::FallbackModelSelector;
use crate::inline::parse_inline_calls;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::prompt::system_prompt;
use crate::tools::ToolRegistry;
use crate::types::{Message, TokenUsage, ToolCallRequest};

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    PlainAnswer(String),
    ToolCalls {
        content: String,
        calls: Vec<ToolCallRequest>,
    },
}

/// A classified model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    pub outcome: TurnOutcome,
    pub model: String,
    pub fallback_used: bool,
    pub usage: TokenUsage,
}

/// Sends turns through the fallback selector.
pub struct TurnController {
    client: Arc<dyn CompletionClient>,
    selector: FallbackModelSelector,
    registry: Arc<ToolRegistry>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

impl TurnController {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<ToolRegistry>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            client,
            selector: FallbackModelSelector::from_config(config),
            registry,
            system_prompt: system_prompt(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: config.stream,
        }
    }

    pub fn selector(&self) -> &FallbackModelSelector {
        &self.selector
    }

    /// Build the request for a conversation.
    pub fn request(&self, history: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.selector.primary().unwrap_or_default().to_string(),
            system_prompt: self.system_prompt.clone(),
            messages: history.to_vec(),
            tools: self.registry.to_wire(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: self.stream,
        }
    }

    /// Ask the model for the next step of the conversation.
    pub async fn next_turn(&self, history: &[Message]) -> ChatResult<TurnResponse> {
        let request = self.request(history);
        let selected = self.selector.complete(self.client.as_ref(), &request).await?;
        let completion = selected.completion;

        let outcome = if !completion.tool_calls.is_empty() {
            TurnOutcome::ToolCalls {
                content: completion.content,
                calls: completion.tool_calls,
            }
        } else if let Some(inline) = parse_inline_calls(&completion.content, &self.registry) {
            debug!(count = inline.calls.len(), "Parsed tool calls from message text");
            TurnOutcome::ToolCalls {
                content: inline.content,
                calls: inline.calls,
            }
        } else {
            TurnOutcome::PlainAnswer(completion.content)
        };

        Ok(TurnResponse {
            outcome,
            model: selected.model,
            fallback_used: selected.fallback_used,
            usage: completion.usage,
        })
    }
}
