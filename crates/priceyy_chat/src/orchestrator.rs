//! The tool-calling loop.
//!
//! A round starts right after the user's message is appended and moves
//! through these states:
//!
//! ```text
//! AWAITING_MODEL -> PLAIN_ANSWER -> DONE
//!                -> TOOL_CALLS_PENDING -> EXECUTING_TOOLS -> AWAITING_MODEL ...
//! ```
//!
//! Tool calls run one at a time in the order the model listed them, and each
//! gets exactly one result message before the model is asked again. The
//! number of model turns per round is bounded; at the bound the round ends
//! with the last assistant text available.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::executor::ToolExecutor;
use crate::llm::CompletionClient;
use crate::turn::{TurnController, TurnOutcome};
use crate::types::{Message, Thread, TokenUsage, ToolResult};

/// Reply used when the turn limit is hit before the model said anything.
const TURN_LIMIT_NOTICE: &str =
    "I could not finish this request within the allowed number of steps. Please try rephrasing or narrowing it down.";

/// States of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    AwaitingModel,
    PlainAnswer,
    ToolCallsPending,
    ExecutingTools,
    Done,
}

/// Summary of a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// The final assistant message
    pub reply: Message,
    /// Model turns used
    pub turns: usize,
    /// Tool calls executed
    pub tool_calls: usize,
    /// Whether a fallback model answered any turn
    pub fallback_active: bool,
    /// Whether the turn limit ended the round
    pub hit_turn_limit: bool,
    /// Model that answered last
    pub model: String,
    pub usage: TokenUsage,
    pub trace: Vec<LoopState>,
}

/// Drives model turns and tool execution for one user message.
pub struct Orchestrator {
    turns: TurnController,
    executor: ToolExecutor,
    max_turns: usize,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        executor: ToolExecutor,
        config: &ChatConfig,
    ) -> Self {
        let turns = TurnController::new(client, executor.shared_registry(), config);
        Self {
            turns,
            executor,
            max_turns: config.max_rounds.max(1),
        }
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Run a round on a thread whose last message is the user's.
    ///
    /// Every message produced is pushed onto the thread as it happens, so a
    /// failed or cancelled round leaves its partial history behind. On
    /// cancellation, calls that did not run receive a "cancelled" result.
    pub async fn run_round(
        &self,
        thread: &mut Thread,
        cancel: &CancellationToken,
    ) -> ChatResult<RoundOutcome> {
        let mut trace = Vec::new();
        let mut usage = TokenUsage::default();
        let mut fallback_active = false;
        let mut model = self.turns.selector().primary().unwrap_or_default().to_string();
        let mut last_content = String::new();
        let mut turns = 0;
        let mut tool_calls = 0;

        info!(thread_id = %thread.id, max_turns = self.max_turns, "Round started");

        loop {
            if cancel.is_cancelled() {
                return Err(ChatError::Cancelled);
            }

            if turns == self.max_turns {
                warn!(thread_id = %thread.id, turns, "Turn limit reached");
                let text = if last_content.trim().is_empty() {
                    TURN_LIMIT_NOTICE.to_string()
                } else {
                    last_content
                };
                let reply = Message::assistant(text);
                thread.push(reply.clone());
                trace.push(LoopState::Done);
                return Ok(RoundOutcome {
                    reply,
                    turns,
                    tool_calls,
                    fallback_active,
                    hit_turn_limit: true,
                    model,
                    usage,
                    trace,
                });
            }

            trace.push(LoopState::AwaitingModel);
            turns += 1;

            let response = tokio::select! {
                response = self.turns.next_turn(thread.messages()) => response?,
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            };
            usage.add(response.usage);
            fallback_active |= response.fallback_used;
            model = response.model;

            match response.outcome {
                TurnOutcome::PlainAnswer(content) => {
                    trace.push(LoopState::PlainAnswer);
                    trace.push(LoopState::Done);
                    let reply = Message::assistant(content);
                    thread.push(reply.clone());
                    info!(
                        thread_id = %thread.id,
                        turns,
                        tool_calls,
                        fallback_active,
                        "Round finished"
                    );
                    return Ok(RoundOutcome {
                        reply,
                        turns,
                        tool_calls,
                        fallback_active,
                        hit_turn_limit: false,
                        model,
                        usage,
                        trace,
                    });
                }
                TurnOutcome::ToolCalls { content, calls } => {
                    trace.push(LoopState::ToolCallsPending);
                    if !content.trim().is_empty() {
                        last_content = content.clone();
                    }
                    thread.push(Message::assistant_tool_calls(content, calls.clone()));

                    trace.push(LoopState::ExecutingTools);
                    for (position, call) in calls.iter().enumerate() {
                        if cancel.is_cancelled() {
                            for skipped in &calls[position..] {
                                thread.push(Message::tool(&ToolResult::err(
                                    skipped.id.clone(),
                                    "cancelled",
                                )));
                            }
                            return Err(ChatError::Cancelled);
                        }
                        let result = self.executor.execute_call(call).await;
                        thread.push(Message::tool(&result));
                        tool_calls += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedModel, ScriptedReply};
    use crate::types::{MessageRole, ToolCallRequest};
    use priceyy_pricing::{CartStore, MockPricingService};

    fn config() -> ChatConfig {
        ChatConfig::default()
            .with_model("primary")
            .with_fallback_models(Vec::new())
    }

    fn orchestrator(model: &ScriptedModel, config: &ChatConfig) -> Orchestrator {
        let executor = ToolExecutor::new(
            Arc::new(MockPricingService::with_sample_catalog()),
            CartStore::default(),
        );
        Orchestrator::new(Arc::new(model.clone()), executor, config)
    }

    fn thread_with(message: &str) -> Thread {
        let mut thread = Thread::for_first_message(message);
        thread.push(Message::user(message));
        thread
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let model = ScriptedModel::new().add_reply(ScriptedReply::answer("Hi! Ask me about prices."));
        let mut thread = thread_with("hello");

        let outcome = orchestrator(&model, &config())
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.reply.content, "Hi! Ask me about prices.");
        assert_eq!(outcome.turns, 1);
        assert_eq!(
            outcome.trace,
            vec![LoopState::AwaitingModel, LoopState::PlainAnswer, LoopState::Done]
        );
        assert_eq!(thread.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_pairs_every_call() {
        let model = ScriptedModel::new()
            .add_reply(ScriptedReply::tool_calls(vec![
                ToolCallRequest::new("c1", "get_providers", "{}"),
                ToolCallRequest::new("c2", "get_regions", r#"{"provider":"aws"}"#),
                ToolCallRequest::new("c3", "launch_rocket", "{}"),
            ]))
            .add_reply(ScriptedReply::answer("AWS has us-east-1 and eu-west-1."));
        let mut thread = thread_with("Which AWS regions are there?");

        let outcome = orchestrator(&model, &config())
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.turns, 2);
        assert_eq!(outcome.tool_calls, 3);

        let tool_messages: Vec<&Message> = thread
            .messages()
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        let ids: Vec<&str> = tool_messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(tool_messages[2].content.contains("unsupported tool"));

        // The second turn saw the tool results.
        let second = &model.requests()[1];
        assert_eq!(second.messages.len(), 5);

        assert_eq!(thread.visible_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_inline_calls_get_distinct_ids_across_turns() {
        let model = ScriptedModel::new()
            .add_reply(ScriptedReply::answer("Checking. [get_providers]"))
            .add_reply(ScriptedReply::answer(r#"And regions. [get_regions(provider="aws")]"#))
            .add_reply(ScriptedReply::answer("AWS, Azure and GCP are available."));
        let mut thread = thread_with("What can I price?");

        let outcome = orchestrator(&model, &config())
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.turns, 3);

        let ids: Vec<&str> = thread
            .messages()
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_tool_mutation_visible_in_cart() {
        let model = ScriptedModel::new()
            .add_reply(ScriptedReply::tool_call(
                "c1",
                "add_to_cart",
                r#"{"provider":"aws","region":"us-east-1","resourceType":"t2.micro","priceModel":"OnDemand","unitOfMeasure":"Hrs","pricePerUnit":0.0116,"quantity":2,"usage":730}"#,
            ))
            .add_reply(ScriptedReply::answer("Added two t2.micro instances."));
        let orchestrator = orchestrator(&model, &config());
        let mut thread = thread_with("add 2 t2.micro for a month");

        orchestrator
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        let cart = orchestrator.executor().cart().snapshot();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.calculation_request().services[0].quantity, 1460.0);
    }

    #[tokio::test]
    async fn test_turn_limit_ends_with_last_content() {
        let mut model = ScriptedModel::new();
        for i in 0..5 {
            model = model.add_reply(ScriptedReply::Completion(crate::stream::Completion {
                content: format!("Still looking ({})", i),
                tool_calls: vec![ToolCallRequest::new(format!("c{}", i), "get_providers", "{}")],
                ..Default::default()
            }));
        }
        let config = config().with_max_rounds(3);
        let mut thread = thread_with("loop forever");

        let outcome = orchestrator(&model, &config)
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.hit_turn_limit);
        assert_eq!(outcome.turns, 3);
        assert_eq!(model.call_count(), 3);
        assert_eq!(outcome.reply.content, "Still looking (2)");
        let awaiting = outcome
            .trace
            .iter()
            .filter(|s| **s == LoopState::AwaitingModel)
            .count();
        assert_eq!(awaiting, 3);
    }

    #[tokio::test]
    async fn test_turn_limit_without_content_uses_notice() {
        let model = ScriptedModel::new()
            .add_reply(ScriptedReply::tool_call("c1", "get_providers", "{}"));
        let config = config().with_max_rounds(1);
        let mut thread = thread_with("providers?");

        let outcome = orchestrator(&model, &config)
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.hit_turn_limit);
        assert_eq!(outcome.reply.content, TURN_LIMIT_NOTICE);
    }

    #[tokio::test]
    async fn test_fallback_marks_round() {
        let model = ScriptedModel::new()
            .fail_model("primary")
            .add_reply(ScriptedReply::answer("from backup"));
        let config = config().with_fallback_models(vec!["backup".to_string()]);
        let mut thread = thread_with("hi");

        let outcome = orchestrator(&model, &config)
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.fallback_active);
        assert_eq!(outcome.model, "backup");
        assert_eq!(model.requested_models(), vec!["primary", "backup"]);
    }

    #[tokio::test]
    async fn test_model_failure_surfaces() {
        let model = ScriptedModel::new().add_reply(ScriptedReply::TransportError("offline".to_string()));
        let mut thread = thread_with("hi");

        let err = orchestrator(&model, &config())
            .run_round(&mut thread, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::AllModelsFailed { .. }));
        assert_eq!(thread.len(), 1);
    }

    /// Cancels the round as soon as the model has answered.
    struct CancellingModel {
        inner: ScriptedModel,
        cancel: CancellationToken,
    }

    #[async_trait::async_trait]
    impl CompletionClient for CancellingModel {
        async fn complete(
            &self,
            request: &crate::llm::CompletionRequest,
        ) -> ChatResult<crate::stream::Completion> {
            let completion = self.inner.complete(request).await;
            self.cancel.cancel();
            completion
        }
    }

    #[tokio::test]
    async fn test_cancel_resolves_pending_calls() {
        let cancel = CancellationToken::new();
        let model = CancellingModel {
            inner: ScriptedModel::new().add_reply(ScriptedReply::tool_calls(vec![
                ToolCallRequest::new("c1", "get_providers", "{}"),
                ToolCallRequest::new("c2", "get_regions", r#"{"provider":"gcp"}"#),
            ])),
            cancel: cancel.clone(),
        };
        let executor = ToolExecutor::new(
            Arc::new(MockPricingService::with_sample_catalog()),
            CartStore::default(),
        );
        let orchestrator = Orchestrator::new(Arc::new(model), executor, &config());
        let mut thread = thread_with("providers?");

        let err = orchestrator.run_round(&mut thread, &cancel).await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));

        let results: Vec<&Message> = thread
            .messages()
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|m| m.content.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let model = ScriptedModel::new().add_reply(ScriptedReply::answer("never"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut thread = thread_with("hi");

        let err = orchestrator(&model, &config())
            .run_round(&mut thread, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Cancelled));
        assert_eq!(model.call_count(), 0);
    }
}
