//! Cost calculation request and response types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::units::serialize_quantity;

/// One line of a `/calculate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationItem {
    pub provider: String,
    pub region: String,
    pub resource_type: String,
    pub price_model: String,
    pub unit_of_measure: String,
    /// Billed quantity (count × usage, or count for fixed-price units)
    #[serde(serialize_with = "serialize_quantity")]
    pub quantity: f64,
}

/// Body of a `/calculate` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub services: Vec<CalculationItem>,
}

impl CalculationRequest {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Cost of one calculated line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCost {
    #[serde(alias = "ResourceType")]
    pub resource_type: String,
    #[serde(alias = "Region")]
    pub region: String,
    #[serde(alias = "costPerMonth", alias = "CostPerMonth")]
    pub total_cost: f64,
}

/// Response of a `/calculate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    #[serde(alias = "totalCostPerMonth", alias = "TotalCostPerMonth")]
    pub total_cost: f64,
    #[serde(default, alias = "Breakdown", deserialize_with = "null_as_empty")]
    pub breakdown: Vec<LineCost>,
}

impl CalculationResult {
    /// Sum of the breakdown lines, for cross-checking the reported total.
    pub fn breakdown_total(&self) -> f64 {
        self.breakdown.iter().map(|line| line.total_cost).sum()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LineCost>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineCost>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = CalculationRequest {
            services: vec![CalculationItem {
                provider: "aws".to_string(),
                region: "us-east-1".to_string(),
                resource_type: "t2.micro".to_string(),
                price_model: "OnDemand".to_string(),
                unit_of_measure: "Hrs".to_string(),
                quantity: 1460.0,
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["services"][0]["resourceType"], "t2.micro");
        assert_eq!(json["services"][0]["unitOfMeasure"], "Hrs");
        assert_eq!(json["services"][0]["quantity"], serde_json::json!(1460));
    }

    #[test]
    fn test_result_accepts_monthly_spelling() {
        let result: CalculationResult = serde_json::from_str(
            r#"{"totalCostPerMonth": 16.94, "breakdown": [
                {"resourceType": "t2.micro", "region": "us-east-1", "costPerMonth": 16.94}
            ]}"#,
        )
        .unwrap();

        assert_eq!(result.total_cost, 16.94);
        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.breakdown_total(), 16.94);
    }

    #[test]
    fn test_result_null_breakdown() {
        let result: CalculationResult =
            serde_json::from_str(r#"{"TotalCostPerMonth": 0, "Breakdown": null}"#).unwrap();
        assert_eq!(result.total_cost, 0.0);
        assert!(result.breakdown.is_empty());
    }
}
