//! # priceyy_pricing
//!
//! Pricing API access and the estimate cart for Priceyy.
//!
//! This crate talks to the remote pricing service (providers, regions,
//! resource types, pricing options, cost calculation) and holds the cart of
//! priced resources a user is assembling.
//!
//! ## Features
//!
//! - Typed client for the pricing API behind the [`PricingApi`] trait
//! - Unit normalization and fixed-price detection
//! - Cart with merge, in-place quantity edits, removal and bulk clear
//! - Cart snapshot persisted under a fixed key in the workspace
//!
//! ## Example
//!
//! ```rust,no_run
//! use priceyy_pricing::{Cart, NewCartItem, PricingApi, PricingClient};
//!
//! # async fn run() -> priceyy_pricing::PricingResult<()> {
//! let client = PricingClient::new("http://localhost:8083");
//! let mut cart = Cart::new();
//! cart.add(NewCartItem {
//!     provider: "aws".to_string(),
//!     region: "us-east-1".to_string(),
//!     resource_type: "t2.micro".to_string(),
//!     price_model: "OnDemand".to_string(),
//!     unit_of_measure: "Hrs".to_string(),
//!     price_per_unit: 0.0116,
//!     usage_quantity: 730.0,
//!     count: 2,
//! })?;
//!
//! let result = client.calculate(&cart.calculation_request()).await?;
//! println!("total: {:.2}", result.total_cost);
//! # Ok(())
//! # }
//! ```

pub mod calculation;
pub mod cart;
pub mod client;
pub mod error;
pub mod mock;
pub mod provider;
pub mod units;

pub use calculation::{CalculationItem, CalculationRequest, CalculationResult, LineCost};
pub use cart::{Cart, CartItem, CartPersistence, CartStore, NewCartItem, QuantityUpdate};
pub use client::{quote_cart, PricingApi, PricingClient, DEFAULT_PRICING_URL};
pub use error::{PricingError, PricingResult};
pub use mock::{CatalogEntry, MockPricingService};
pub use provider::{CloudProvider, ResourceOption};
pub use units::{billed_quantity, is_fixed_unit, UsageUnit};
