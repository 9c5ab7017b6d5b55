//! In-memory pricing service for testing.
//!
//! Provides a configurable [`PricingApi`] implementation backed by a small
//! catalog, so cart, tool and chat tests run without the remote service.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::calculation::{CalculationRequest, CalculationResult, LineCost};
use crate::client::PricingApi;
use crate::error::{PricingError, PricingResult};
use crate::provider::ResourceOption;

/// One priced catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub provider: String,
    pub region: String,
    pub resource_type: String,
    pub option: ResourceOption,
}

impl CatalogEntry {
    pub fn new(
        provider: &str,
        region: &str,
        resource_type: &str,
        price_model: &str,
        unit_of_measure: &str,
        price_per_unit: f64,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            region: region.to_string(),
            resource_type: resource_type.to_string(),
            option: ResourceOption {
                price_model: price_model.to_string(),
                unit_of_measure: unit_of_measure.to_string(),
                price_per_unit,
            },
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub method: String,
    pub args: Vec<String>,
}

/// Mock pricing service.
///
/// Captures every call and answers from its catalog. `calculate` multiplies
/// the billed quantity by the catalog price, and answers 404 for lines that
/// are not in the catalog.
#[derive(Debug, Clone, Default)]
pub struct MockPricingService {
    catalog: Arc<RwLock<Vec<CatalogEntry>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    calculations: Arc<RwLock<Vec<CalculationRequest>>>,
    simulate_failure: Arc<RwLock<Option<(u16, String)>>>,
}

impl MockPricingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalog across the three providers.
    pub fn with_sample_catalog() -> Self {
        Self::new()
            .add_entry(CatalogEntry::new("aws", "us-east-1", "t2.micro", "OnDemand", "Hrs", 0.0116))
            .add_entry(CatalogEntry::new("aws", "us-east-1", "t2.micro", "Reserved", "1", 60.0))
            .add_entry(CatalogEntry::new("aws", "us-east-1", "t2.small", "OnDemand", "Hrs", 0.023))
            .add_entry(CatalogEntry::new("aws", "eu-west-1", "t2.micro", "OnDemand", "Hrs", 0.0126))
            .add_entry(CatalogEntry::new("aws", "us-east-1", "s3.standard", "OnDemand", "GB-Mo", 0.023))
            .add_entry(CatalogEntry::new("gcp", "us-central1", "e2-micro", "OnDemand", "Hrs", 0.0084))
            .add_entry(CatalogEntry::new("azure", "eastus", "B1s", "OnDemand", "1 Hour", 0.0104))
    }

    /// Add a catalog entry.
    pub fn add_entry(self, entry: CatalogEntry) -> Self {
        self.catalog.write().push(entry);
        self
    }

    /// Answer every call with an API error.
    pub fn simulate_failure(self, status: u16, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some((status, message.into()));
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Requests received by `calculate`.
    pub fn calculations(&self) -> Vec<CalculationRequest> {
        self.calculations.read().clone()
    }

    fn record_call(&self, method: &str, args: &[&str]) -> PricingResult<()> {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        if let Some((status, message)) = self.simulate_failure.read().clone() {
            return Err(PricingError::Api { status, message });
        }
        Ok(())
    }

    fn distinct<F>(&self, keep: impl Fn(&CatalogEntry) -> bool, field: F) -> Vec<String>
    where
        F: Fn(&CatalogEntry) -> &str,
    {
        let mut values: Vec<String> = Vec::new();
        for entry in self.catalog.read().iter().filter(|e| keep(e)) {
            let value = field(entry);
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }
        values
    }
}

#[async_trait]
impl PricingApi for MockPricingService {
    async fn providers(&self) -> PricingResult<Vec<String>> {
        self.record_call("providers", &[])?;
        let mut providers = self.distinct(|_| true, |e| e.provider.as_str());
        providers.sort();
        Ok(providers)
    }

    async fn regions(&self, provider: &str) -> PricingResult<Vec<String>> {
        self.record_call("regions", &[provider])?;
        Ok(self.distinct(|e| e.provider == provider, |e| e.region.as_str()))
    }

    async fn resource_types(
        &self,
        provider: &str,
        region: &str,
        query: &str,
    ) -> PricingResult<Vec<String>> {
        self.record_call("resource_types", &[provider, region, query])?;
        let query = query.to_lowercase();
        Ok(self.distinct(
            |e| {
                e.provider == provider
                    && e.region == region
                    && e.resource_type.to_lowercase().contains(&query)
            },
            |e| e.resource_type.as_str(),
        ))
    }

    async fn resource_options(
        &self,
        provider: &str,
        region: &str,
        resource_type: &str,
    ) -> PricingResult<Vec<ResourceOption>> {
        self.record_call("resource_options", &[provider, region, resource_type])?;
        Ok(self
            .catalog
            .read()
            .iter()
            .filter(|e| {
                e.provider == provider && e.region == region && e.resource_type == resource_type
            })
            .map(|e| e.option.clone())
            .collect())
    }

    async fn calculate(&self, request: &CalculationRequest) -> PricingResult<CalculationResult> {
        self.record_call("calculate", &[])?;
        self.calculations.write().push(request.clone());

        let catalog = self.catalog.read();
        let mut breakdown = Vec::with_capacity(request.services.len());
        for line in &request.services {
            let entry = catalog
                .iter()
                .find(|e| {
                    e.provider == line.provider
                        && e.region == line.region
                        && e.resource_type == line.resource_type
                        && e.option.price_model == line.price_model
                        && e.option.unit_of_measure == line.unit_of_measure
                })
                .ok_or_else(|| PricingError::Api {
                    status: 404,
                    message: format!(
                        "price not found for {} in {}",
                        line.resource_type, line.region
                    ),
                })?;
            breakdown.push(LineCost {
                resource_type: line.resource_type.clone(),
                region: line.region.clone(),
                total_cost: entry.option.price_per_unit * line.quantity,
            });
        }

        Ok(CalculationResult {
            total_cost: breakdown.iter().map(|l| l.total_cost).sum(),
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{Cart, NewCartItem};
    use crate::client::quote_cart;

    #[tokio::test]
    async fn test_catalog_queries() {
        let service = MockPricingService::with_sample_catalog();

        assert_eq!(service.providers().await.unwrap(), vec!["aws", "azure", "gcp"]);
        assert_eq!(service.regions("aws").await.unwrap(), vec!["us-east-1", "eu-west-1"]);
        assert_eq!(
            service.resource_types("aws", "us-east-1", "T2").await.unwrap(),
            vec!["t2.micro", "t2.small"]
        );
        assert_eq!(
            service.resource_options("aws", "us-east-1", "t2.micro").await.unwrap().len(),
            2
        );
        assert_eq!(service.call_count(), 4);
    }

    #[tokio::test]
    async fn test_calculate_prices_billed_quantity() {
        let service = MockPricingService::with_sample_catalog();
        let mut cart = Cart::new();
        cart.add(NewCartItem {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            resource_type: "t2.micro".to_string(),
            price_model: "OnDemand".to_string(),
            unit_of_measure: "Hrs".to_string(),
            price_per_unit: 0.0116,
            usage_quantity: 730.0,
            count: 2,
        })
        .unwrap();

        let result = quote_cart(&service, &cart).await.unwrap();
        assert!((result.total_cost - 16.936).abs() < 1e-9);
        assert_eq!(service.calculations()[0].services[0].quantity, 1460.0);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let service = MockPricingService::with_sample_catalog().simulate_failure(503, "down");
        let err = service.providers().await.unwrap_err();
        assert!(matches!(err, PricingError::Api { status: 503, .. }));
        assert!(service.was_called("providers"));
    }
}
