//! # priceyy_chat - Cost assistant chat for Priceyy
//!
//! This crate lets a user talk to a language model that can look up cloud
//! prices and fill the estimate cart on their behalf:
//! - A fixed registry of pricing and cart tools with per-tool schemas
//! - A bounded tool-calling loop per user message
//! - Ordered model fallback when the primary model fails
//! - Persisted conversation threads
//!
//! ## Key Features
//!
//! - **Streaming**: Server-sent deltas are accumulated into one completion
//! - **Argument Recovery**: Sloppy tool arguments are repaired before validation
//! - **Inline Calls**: Bracketed calls written into the text are recognized
//! - **LLM Optional**: Cart and catalog work without an API key
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   AppSession    │────▶│  Orchestrator   │────▶│ TurnController  │
//! └────────┬────────┘     └────────┬────────┘     └────────┬────────┘
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Threads + Cart  │     │  ToolExecutor   │     │ Fallback + LLM  │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod inline;
pub mod llm;
pub mod mock;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod prompt;
pub mod repair;
pub mod session;
pub mod stream;
pub mod tools;
pub mod turn;
pub mod types;

pub use config::{ChatConfig, Settings};
pub use error::{ChatError, ChatResult, ModelAttempt};
pub use executor::{ToolError, ToolExecutor};
pub use fallback::{FallbackModelSelector, SelectedCompletion};
pub use llm::{CompletionClient, CompletionRequest, OpenRouterClient};
pub use mock::{ScriptedModel, ScriptedReply};
pub use models::{ModelEntry, DEFAULT_MODEL};
pub use orchestrator::{LoopState, Orchestrator, RoundOutcome};
pub use persistence::ThreadPersistence;
pub use session::AppSession;
pub use stream::{Completion, StreamAccumulator};
pub use tools::{ToolName, ToolRegistry};
pub use turn::{TurnController, TurnOutcome, TurnResponse};
pub use types::*;
