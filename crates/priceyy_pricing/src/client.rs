//! HTTP client for the pricing service.
//!
//! Endpoints:
//! - `GET /providers`
//! - `GET /regions?provider=`
//! - `GET /resources?provider=&region=&q=`
//! - `GET /resource-options?provider=&region=&resourceType=`
//! - `POST /calculate`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::calculation::{CalculationRequest, CalculationResult};
use crate::cart::Cart;
use crate::error::{PricingError, PricingResult};
use crate::provider::ResourceOption;

/// Pricing service address used when nothing else is configured.
pub const DEFAULT_PRICING_URL: &str = "http://localhost:8083";

/// Operations offered by the pricing service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingApi: Send + Sync {
    /// List the cloud providers present in the catalog.
    async fn providers(&self) -> PricingResult<Vec<String>>;

    /// List the regions of one provider.
    async fn regions(&self, provider: &str) -> PricingResult<Vec<String>>;

    /// Search resource types of a provider/region; an empty query lists all.
    async fn resource_types(
        &self,
        provider: &str,
        region: &str,
        query: &str,
    ) -> PricingResult<Vec<String>>;

    /// Pricing options for one resource type.
    async fn resource_options(
        &self,
        provider: &str,
        region: &str,
        resource_type: &str,
    ) -> PricingResult<Vec<ResourceOption>>;

    /// Price a set of billed lines.
    async fn calculate(&self, request: &CalculationRequest) -> PricingResult<CalculationResult>;
}

/// Price every line of a cart.
pub async fn quote_cart(api: &dyn PricingApi, cart: &Cart) -> PricingResult<CalculationResult> {
    if cart.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    api.calculate(&cart.calculation_request()).await
}

/// reqwest-backed [`PricingApi`].
#[derive(Debug, Clone)]
pub struct PricingClient {
    base_url: String,
    client: reqwest::Client,
}

impl PricingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> PricingResult<T> {
        let url = self.url(path);
        debug!(url = %url, ?query, "GET pricing API");

        let response = self.client.get(&url).query(query).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> PricingResult<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "Pricing API returned an error");
            return Err(PricingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PricingError::Decode(e.to_string()))
    }
}

/// Pull a readable message out of an error body.
///
/// The service answers with either `{"error": "..."}` or a plain-text line.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error details".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl PricingApi for PricingClient {
    async fn providers(&self) -> PricingResult<Vec<String>> {
        self.get_json("providers", &[]).await
    }

    async fn regions(&self, provider: &str) -> PricingResult<Vec<String>> {
        self.get_json("regions", &[("provider", provider)]).await
    }

    async fn resource_types(
        &self,
        provider: &str,
        region: &str,
        query: &str,
    ) -> PricingResult<Vec<String>> {
        self.get_json(
            "resources",
            &[("provider", provider), ("region", region), ("q", query)],
        )
        .await
    }

    async fn resource_options(
        &self,
        provider: &str,
        region: &str,
        resource_type: &str,
    ) -> PricingResult<Vec<ResourceOption>> {
        self.get_json(
            "resource-options",
            &[
                ("provider", provider),
                ("region", region),
                ("resourceType", resource_type),
            ],
        )
        .await
    }

    async fn calculate(&self, request: &CalculationRequest) -> PricingResult<CalculationResult> {
        let url = self.url("calculate");
        debug!(url = %url, lines = request.services.len(), "POST pricing API");

        let response = self.client.post(&url).json(request).send().await?;
        Self::decode(response).await
    }
}
