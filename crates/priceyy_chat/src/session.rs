//! Application session.
//!
//! The session owns every piece of state a user interacts with: the
//! resolved configuration, the thread store, the cart and the pricing
//! client. It is the main entry point for the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use priceyy_pricing::{
    quote_cart, CalculationResult, Cart, CartItem, CartPersistence, CartStore, NewCartItem,
    PricingApi, PricingClient, QuantityUpdate,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::executor::ToolExecutor;
use crate::llm::{CompletionClient, OpenRouterClient};
use crate::orchestrator::Orchestrator;
use crate::persistence::ThreadPersistence;
use crate::types::{title_from, ChatResponse, Message, Thread, ThreadId, ThreadSummary};

/// State of one workspace: threads, cart, pricing and model access.
pub struct AppSession {
    workspace_root: PathBuf,
    config: ChatConfig,
    threads: ThreadPersistence,
    cart: CartStore,
    cart_persistence: CartPersistence,
    pricing: Arc<dyn PricingApi>,
    orchestrator: Option<Orchestrator>,
}

impl AppSession {
    /// Open a workspace with the real pricing service and model router.
    ///
    /// A missing API key is not an error here; chat fails later with
    /// [`ChatError::LlmNotConfigured`] while cart and catalog access work.
    pub fn open(workspace_root: impl AsRef<Path>, config: ChatConfig) -> ChatResult<Self> {
        let pricing: Arc<dyn PricingApi> =
            Arc::new(PricingClient::new(config.pricing_api_url.clone()));
        let client: Option<Arc<dyn CompletionClient>> = match OpenRouterClient::from_config(&config)
        {
            Ok(client) => Some(Arc::new(client)),
            Err(ChatError::LlmNotConfigured) => None,
            Err(e) => return Err(e),
        };
        Self::build(workspace_root.as_ref(), config, client, pricing)
    }

    /// Open a workspace with injected clients.
    pub fn with_clients(
        workspace_root: impl AsRef<Path>,
        config: ChatConfig,
        client: Arc<dyn CompletionClient>,
        pricing: Arc<dyn PricingApi>,
    ) -> ChatResult<Self> {
        Self::build(workspace_root.as_ref(), config, Some(client), pricing)
    }

    fn build(
        workspace_root: &Path,
        config: ChatConfig,
        client: Option<Arc<dyn CompletionClient>>,
        pricing: Arc<dyn PricingApi>,
    ) -> ChatResult<Self> {
        config.validate()?;

        let cart_persistence = CartPersistence::new(workspace_root);
        let cart = CartStore::new(cart_persistence.load()?);
        let orchestrator = client.map(|client| {
            let executor = ToolExecutor::new(Arc::clone(&pricing), cart.clone());
            Orchestrator::new(client, executor, &config)
        });

        Ok(Self {
            workspace_root: workspace_root.to_path_buf(),
            config,
            threads: ThreadPersistence::new(workspace_root),
            cart,
            cart_persistence,
            pricing,
            orchestrator,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Check if a model client is available
    pub fn has_llm(&self) -> bool {
        self.orchestrator.is_some()
    }

    pub fn pricing(&self) -> &dyn PricingApi {
        self.pricing.as_ref()
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Send a user message to the current thread, starting one if needed.
    ///
    /// Every message the round appended is persisted, also when the round
    /// fails or is cancelled. The cart is saved afterwards either way.
    pub async fn send_message(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> ChatResult<ChatResponse> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let orchestrator = self
            .orchestrator
            .as_ref()
            .ok_or(ChatError::LlmNotConfigured)?;

        let mut thread = self.current_or_new_thread(content)?;
        let persisted = thread.len();
        thread.push(Message::user(content));
        info!(thread_id = %thread.id, "User message");

        let result = orchestrator.run_round(&mut thread, cancel).await;

        self.threads
            .append_messages(&thread.id, &thread.messages()[persisted..])?;
        self.threads.save_metadata(&thread)?;
        self.save_cart()?;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(thread_id = %thread.id, error = %e, "Round failed");
                return Err(e);
            }
        };

        Ok(ChatResponse {
            thread_id: thread.id.clone(),
            reply: outcome.reply,
            transcript: thread.visible_messages().into_iter().cloned().collect(),
            fallback_active: outcome.fallback_active,
            model: outcome.model,
            turns: outcome.turns,
            hit_turn_limit: outcome.hit_turn_limit,
            usage: outcome.usage,
        })
    }

    fn current_or_new_thread(&self, first_message: &str) -> ChatResult<Thread> {
        if let Some(id) = self.threads.current_thread_id()? {
            if self.threads.exists(&id) {
                let mut thread = self.threads.load_thread(&id)?;
                if thread.is_empty() {
                    thread.title = title_from(first_message);
                }
                return Ok(thread);
            }
            warn!(thread_id = %id, "Current thread is gone, starting a new one");
        }

        let thread = Thread::for_first_message(first_message);
        self.threads.save_metadata(&thread)?;
        self.threads.set_current(&thread.id)?;
        info!(thread_id = %thread.id, title = %thread.title, "Started thread");
        Ok(thread)
    }

    // =========================================================================
    // Threads
    // =========================================================================

    /// Make the next message start a fresh thread.
    pub fn start_new_thread(&self) -> ChatResult<()> {
        self.threads.clear_current()
    }

    pub fn select_thread(&self, thread_id: &str) -> ChatResult<Thread> {
        let thread = self.threads.load_thread(thread_id)?;
        self.threads.set_current(&thread.id)?;
        Ok(thread)
    }

    pub fn current_thread(&self) -> ChatResult<Option<Thread>> {
        match self.threads.current_thread_id()? {
            Some(id) if self.threads.exists(&id) => Ok(Some(self.threads.load_thread(&id)?)),
            _ => Ok(None),
        }
    }

    pub fn current_thread_id(&self) -> ChatResult<Option<ThreadId>> {
        self.threads.current_thread_id()
    }

    pub fn load_thread(&self, thread_id: &str) -> ChatResult<Thread> {
        self.threads.load_thread(thread_id)
    }

    /// The user-visible transcript of a thread.
    pub fn transcript(&self, thread_id: &str) -> ChatResult<Vec<Message>> {
        let thread = self.threads.load_thread(thread_id)?;
        Ok(thread.visible_messages().into_iter().cloned().collect())
    }

    pub fn list_threads(&self) -> ChatResult<Vec<ThreadSummary>> {
        self.threads.list_threads()
    }

    pub fn delete_thread(&self, thread_id: &str) -> ChatResult<()> {
        self.threads.delete_thread(thread_id)?;
        info!(thread_id, "Deleted thread");
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    pub fn cart(&self) -> Cart {
        self.cart.snapshot()
    }

    pub fn add_to_cart(&self, item: NewCartItem) -> ChatResult<CartItem> {
        let line = self.cart.add(item)?;
        self.save_cart()?;
        Ok(line)
    }

    pub fn update_cart_item(&self, id: &str, update: QuantityUpdate) -> ChatResult<CartItem> {
        let line = self.cart.write(|cart| cart.update(id, update))?;
        self.save_cart()?;
        Ok(line)
    }

    pub fn remove_cart_item(&self, id: &str) -> ChatResult<CartItem> {
        let line = self.cart.write(|cart| cart.remove(id))?;
        self.save_cart()?;
        Ok(line)
    }

    /// Empty the cart, returning how many lines were dropped.
    pub fn clear_cart(&self) -> ChatResult<usize> {
        let removed = self.cart.write(Cart::clear);
        self.save_cart()?;
        Ok(removed)
    }

    pub fn save_cart(&self) -> ChatResult<()> {
        self.cart_persistence.save(&self.cart.snapshot())?;
        Ok(())
    }

    /// Price the whole cart with the pricing service.
    pub async fn calculate(&self) -> ChatResult<CalculationResult> {
        let cart = self.cart.snapshot();
        let result = quote_cart(self.pricing.as_ref(), &cart).await?;
        info!(lines = cart.len(), total = result.total_cost, "Calculated cart");
        Ok(result)
    }
}
