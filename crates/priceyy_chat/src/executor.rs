//! Tool execution.
//!
//! The executor turns a tool name and raw argument text into a
//! [`ToolResult`]. It recovers malformed arguments, validates them against
//! the tool's schema, and then performs exactly one pricing fetch or cart
//! mutation. Every failure becomes an error result for the model to read;
//! nothing is raised past this boundary.

use std::sync::Arc;
use std::time::Instant;

use priceyy_pricing::{CartStore, NewCartItem, PricingApi, PricingError};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::repair::{recover_arguments, RecoveryStage};
use crate::tools::{AddToCartArgs, ToolArgs, ToolName, ToolRegistry};
use crate::types::{ToolCallRequest, ToolResult};

/// Reasons a tool call fails.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("malformed arguments for {tool}: {reason}")]
    MalformedArguments { tool: ToolName, reason: String },

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },

    #[error("{0}")]
    Pricing(#[from] PricingError),
}

/// Runs registered tools against the pricing service and the shared cart.
#[derive(Clone)]
pub struct ToolExecutor {
    pricing: Arc<dyn PricingApi>,
    cart: CartStore,
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(pricing: Arc<dyn PricingApi>, cart: CartStore) -> Self {
        Self {
            pricing,
            cart,
            registry: Arc::new(ToolRegistry::new()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle to the registry, for the turn controller.
    pub fn shared_registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Execute one tool. The result carries no call id.
    pub async fn execute(&self, tool_name: &str, raw_arguments: &str) -> ToolResult {
        match self.run(tool_name, raw_arguments).await {
            Ok(data) => ToolResult::ok(String::new(), data),
            Err(e) => ToolResult::err(String::new(), e.to_string()),
        }
    }

    /// Execute a model-requested call, pairing the result with its id.
    pub async fn execute_call(&self, call: &ToolCallRequest) -> ToolResult {
        let started = Instant::now();
        info!(tool = %call.tool_name, call_id = %call.id, "Tool call");

        let mut result = self.execute(&call.tool_name, &call.raw_arguments).await;
        result.tool_call_id = call.id.clone();

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result.error {
            None => info!(tool = %call.tool_name, call_id = %call.id, duration_ms, "Tool result"),
            Some(error) => warn!(
                tool = %call.tool_name,
                call_id = %call.id,
                duration_ms,
                error = %error,
                "Tool error"
            ),
        }
        result
    }

    async fn run(&self, tool_name: &str, raw_arguments: &str) -> Result<Value, ToolError> {
        let tool = self
            .registry
            .resolve(tool_name)
            .ok_or_else(|| ToolError::UnsupportedTool(tool_name.to_string()))?;

        let recovered =
            recover_arguments(raw_arguments).map_err(|e| ToolError::MalformedArguments {
                tool,
                reason: e.0,
            })?;
        if recovered.stage != RecoveryStage::Direct {
            debug!(tool = %tool, stage = ?recovered.stage, raw = raw_arguments, "Recovered tool arguments");
        }
        if recovered.dropped_objects > 0 {
            warn!(
                tool = %tool,
                dropped = recovered.dropped_objects,
                "Ignoring extra argument objects glued to the first"
            );
        }

        let args = self
            .registry
            .validate(tool, &recovered.value)
            .map_err(|reason| ToolError::InvalidArguments { tool, reason })?;

        self.dispatch(args).await
    }

    async fn dispatch(&self, args: ToolArgs) -> Result<Value, ToolError> {
        match args {
            ToolArgs::GetProviders => Ok(json!(self.pricing.providers().await?)),
            ToolArgs::GetRegions(a) => Ok(json!(self.pricing.regions(&a.provider).await?)),
            ToolArgs::SearchResources(a) => {
                let query = a.query.as_deref().unwrap_or_default();
                Ok(json!(
                    self.pricing
                        .resource_types(&a.provider, &a.region, query)
                        .await?
                ))
            }
            ToolArgs::GetPricingOptions(a) => Ok(json!(
                self.pricing
                    .resource_options(&a.provider, &a.region, &a.resource_type)
                    .await?
            )),
            ToolArgs::AddToCart(a) => self.add_to_cart(a),
        }
    }

    fn add_to_cart(&self, args: AddToCartArgs) -> Result<Value, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: ToolName::AddToCart,
            reason,
        };

        if args.quantity.fract() != 0.0 || args.quantity < 1.0 || args.quantity > u32::MAX as f64 {
            return Err(invalid(format!(
                "quantity must be a whole number of at least 1, got {}",
                args.quantity
            )));
        }

        let item = self.cart.add(NewCartItem {
            provider: args.provider,
            region: args.region,
            resource_type: args.resource_type,
            price_model: args.price_model,
            unit_of_measure: args.unit_of_measure,
            price_per_unit: args.price_per_unit,
            usage_quantity: args.usage.unwrap_or(1.0),
            count: args.quantity as u32,
        })?;

        info!(
            item_id = %item.id,
            resource = %item.resource_type,
            count = item.count,
            usage = item.usage_quantity,
            "Cart item added by assistant"
        );

        Ok(json!({
            "item": item,
            "cartSize": self.cart.len(),
            "estimatedMonthlyCost": item.estimated_cost(),
        }))
    }
}
