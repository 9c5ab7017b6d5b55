//! Error types for pricing and cart operations.

use thiserror::Error;

/// Result type alias for pricing operations.
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors that can occur while talking to the pricing API or editing the cart.
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Pricing API unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Pricing API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected pricing API response: {0}")]
    Decode(String),

    #[error("Unknown cloud provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid cart item: {0}")]
    InvalidItem(String),

    #[error("Cart item not found: {0}")]
    ItemNotFound(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PricingError {
    /// Whether the error came from the remote service rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { .. } | Self::Decode(_))
    }
}
