//! Model fallback.
//!
//! A turn is first sent to the primary model. When that fails with a
//! network error, a rate limit or any other error response, the same turn is
//! sent to each fallback model in order, once each, without backoff. Only
//! when every candidate failed is a single error raised, listing every
//! attempt.

use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult, ModelAttempt};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::stream::Completion;

/// A completion together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCompletion {
    pub completion: Completion,
    pub model: String,
    /// Whether a candidate beyond the primary answered
    pub fallback_used: bool,
    /// Failed attempts before the answer
    pub failures: Vec<ModelAttempt>,
}

/// Ordered list of candidate models for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackModelSelector {
    candidates: Vec<String>,
}

impl FallbackModelSelector {
    /// Primary first, then fallbacks in order, without duplicates or blanks.
    pub fn new(primary: impl Into<String>, fallbacks: &[String]) -> Self {
        let mut candidates: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
        for model in std::iter::once(primary.into()).chain(fallbacks.iter().cloned()) {
            let model = model.trim().to_string();
            if !model.is_empty() && !candidates.contains(&model) {
                candidates.push(model);
            }
        }
        Self { candidates }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.model.clone(), &config.fallback_models)
    }

    pub fn primary(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Send the turn to each candidate until one answers.
    pub async fn complete(
        &self,
        client: &dyn CompletionClient,
        request: &CompletionRequest,
    ) -> ChatResult<SelectedCompletion> {
        let mut failures = Vec::new();

        for (position, model) in self.candidates.iter().enumerate() {
            if position > 0 {
                info!(model = %model, attempt = position + 1, "Falling back to next model");
            }

            match client.complete(&request.for_model(model)).await {
                Ok(completion) => {
                    return Ok(SelectedCompletion {
                        completion,
                        model: model.clone(),
                        fallback_used: position > 0,
                        failures,
                    })
                }
                Err(e) if is_model_failure(&e) => {
                    warn!(model = %model, error = %e, "Model attempt failed");
                    failures.push(ModelAttempt {
                        model: model.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(ChatError::AllModelsFailed { attempts: failures })
    }
}

/// Failures that are specific to one model and worth retrying on another.
fn is_model_failure(error: &ChatError) -> bool {
    matches!(
        error,
        ChatError::Transport(_) | ChatError::Api { .. } | ChatError::MalformedResponse(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use mockall::Sequence;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: String::new(),
            system_prompt: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: 256,
            temperature: 0.7,
            stream: false,
        }
    }

    fn answer(text: &str) -> Completion {
        Completion {
            content: text.to_string(),
            ..Completion::default()
        }
    }

    #[test]
    fn test_candidates_deduplicated_primary_first() {
        let selector = FallbackModelSelector::new(
            "a",
            &["b".to_string(), "a".to_string(), " ".to_string(), "c".to_string(), "b".to_string()],
        );
        assert_eq!(selector.candidates(), &["a", "b", "c"]);
        assert_eq!(selector.primary(), Some("a"));
    }

    #[tokio::test]
    async fn test_primary_success_is_not_fallback() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|r| r.model == "a")
            .times(1)
            .returning(|_| Ok(answer("hello")));

        let selector = FallbackModelSelector::new("a", &["b".to_string()]);
        let selected = selector.complete(&client, &request()).await.unwrap();

        assert_eq!(selected.model, "a");
        assert!(!selected.fallback_used);
        assert!(selected.failures.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_after_rate_limit() {
        let mut seq = Sequence::new();
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .withf(|r| r.model == "a")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ChatError::Api {
                    status: 429,
                    body: "rate limited".to_string(),
                })
            });
        client
            .expect_complete()
            .withf(|r| r.model == "b")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(answer("from b")));

        let selector = FallbackModelSelector::new("a", &["b".to_string(), "c".to_string()]);
        let selected = selector.complete(&client, &request()).await.unwrap();

        assert_eq!(selected.model, "b");
        assert!(selected.fallback_used);
        assert_eq!(selected.failures.len(), 1);
        assert_eq!(selected.completion.content, "from b");
    }

    #[tokio::test]
    async fn test_every_candidate_tried_in_order_before_error() {
        let mut seq = Sequence::new();
        let mut client = MockCompletionClient::new();
        for model in ["a", "b", "c"] {
            client
                .expect_complete()
                .withf(move |r| r.model == model)
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Err(ChatError::Transport(format!("{} unreachable", model))));
        }

        let selector = FallbackModelSelector::new("a", &["b".to_string(), "c".to_string()]);
        let err = selector.complete(&client, &request()).await.unwrap_err();

        match err {
            ChatError::AllModelsFailed { attempts } => {
                let models: Vec<&str> = attempts.iter().map(|a| a.model.as_str()).collect();
                assert_eq!(models, vec!["a", "b", "c"]);
                assert!(attempts[2].error.contains("c unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_model_errors_stop_immediately() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(1)
            .returning(|_| Err(ChatError::Cancelled));

        let selector = FallbackModelSelector::new("a", &["b".to_string()]);
        let err = selector.complete(&client, &request()).await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
    }
}
