//! Cloud provider and catalog types.

use serde::{Deserialize, Serialize};

use crate::error::PricingError;
use crate::units::UsageUnit;

/// Cloud providers known to the pricing catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp]
    }

    /// Human-facing name.
    pub fn display_name(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "Amazon Web Services",
            CloudProvider::Azure => "Microsoft Azure",
            CloudProvider::Gcp => "Google Cloud",
        }
    }

    /// Get default region for the provider.
    pub fn default_region(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "us-east-1",
            CloudProvider::Azure => "eastus",
            CloudProvider::Gcp => "us-central1",
        }
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aws" | "amazon" => Ok(CloudProvider::Aws),
            "azure" | "microsoft" => Ok(CloudProvider::Azure),
            "gcp" | "google" => Ok(CloudProvider::Gcp),
            _ => Err(PricingError::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchasable pricing option for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOption {
    /// Pricing model (e.g. "OnDemand", "Reserved")
    pub price_model: String,
    /// Unit the price is quoted in ("Hrs", "GB-Mo", "1" for fixed price)
    pub unit_of_measure: String,
    /// Price per unit in USD
    pub price_per_unit: f64,
}

impl ResourceOption {
    pub fn unit(&self) -> UsageUnit {
        UsageUnit::parse(&self.unit_of_measure)
    }

    pub fn is_fixed(&self) -> bool {
        self.unit().is_fixed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("aws".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
        assert_eq!(" GCP ".parse::<CloudProvider>().unwrap(), CloudProvider::Gcp);
        assert_eq!("Azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
        assert!(matches!(
            "oracle".parse::<CloudProvider>(),
            Err(PricingError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_provider_serde_is_lowercase() {
        let json = serde_json::to_string(&CloudProvider::Gcp).unwrap();
        assert_eq!(json, "\"gcp\"");
    }

    #[test]
    fn test_resource_option_wire_format() {
        let option: ResourceOption = serde_json::from_str(
            r#"{"priceModel":"OnDemand","unitOfMeasure":"Hrs","pricePerUnit":0.0116}"#,
        )
        .unwrap();
        assert_eq!(option.price_model, "OnDemand");
        assert!(!option.is_fixed());
        assert_eq!(option.unit(), UsageUnit::Hours);
    }
}
