//! Usage units and quantity normalization.
//!
//! The catalog quotes prices per unit of measure ("Hrs", "GB-Mo", ...). A
//! unit of `"1"` marks a fixed-price resource: it is bought by count and has
//! no usage dimension. Everything else is metered, and the quantity sent to
//! the pricing API is `count × usage`.

use serde::{Deserialize, Serialize};

/// Hours in a billing month, as used by the pricing service.
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Usage presets offered for metered resources.
pub const USAGE_PRESETS: [f64; 4] = [1.0, 8.0, 24.0, HOURS_PER_MONTH];

/// Instance-count presets.
pub const INSTANCE_PRESETS: [u32; 4] = [1, 2, 4, 8];

/// Normalized unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "label")]
pub enum UsageUnit {
    /// Fixed price, billed per item
    Fixed,
    Hours,
    GbMonth,
    Gigabytes,
    Requests,
    /// Any other catalog label, kept verbatim
    Other(String),
}

impl UsageUnit {
    /// Normalize a catalog unit label.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        if is_fixed_unit(trimmed) {
            return Self::Fixed;
        }

        match trimmed.to_lowercase().as_str() {
            "hrs" | "hr" | "h" | "hour" | "hours" | "1 hour" | "per hour" => Self::Hours,
            "gb-mo" | "gb-month" | "gb/month" | "gibibyte month" | "gib month" => Self::GbMonth,
            "gb" | "gib" | "gibibyte" => Self::Gigabytes,
            "requests" | "request" | "1m requests" | "10k requests" => Self::Requests,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// Label for the usage field of a metered line.
    pub fn label(&self) -> &str {
        match self {
            Self::Fixed => "items",
            Self::Hours => "hours",
            Self::GbMonth => "GB-months",
            Self::Gigabytes => "GB",
            Self::Requests => "requests",
            Self::Other(label) => label,
        }
    }

    /// Usage quantity suggested for a fresh line.
    pub fn default_usage(&self) -> f64 {
        match self {
            Self::Hours => HOURS_PER_MONTH,
            _ => 1.0,
        }
    }
}

/// Whether a catalog unit denotes a fixed-price resource.
pub fn is_fixed_unit(unit: &str) -> bool {
    unit.trim() == "1"
}

/// Quantity sent to the pricing API for one cart line.
pub fn billed_quantity(count: u32, usage_quantity: f64, unit_of_measure: &str) -> f64 {
    if is_fixed_unit(unit_of_measure) {
        count as f64
    } else {
        count as f64 * usage_quantity
    }
}

/// Serialize whole quantities as JSON integers.
///
/// The pricing service decodes `quantity` into an integer field and rejects
/// `1460.0`; fractional usage still goes out as a float.
pub(crate) fn serialize_quantity<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.fract() == 0.0 && *value >= 0.0 && *value <= u64::MAX as f64 {
        serializer.serialize_u64(*value as u64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_unit_detection() {
        assert!(is_fixed_unit("1"));
        assert!(is_fixed_unit(" 1 "));
        assert!(!is_fixed_unit("Hrs"));
        assert!(!is_fixed_unit("10"));
    }

    #[test]
    fn test_unit_normalization() {
        assert_eq!(UsageUnit::parse("Hrs"), UsageUnit::Hours);
        assert_eq!(UsageUnit::parse("1 Hour"), UsageUnit::Hours);
        assert_eq!(UsageUnit::parse("GB-Mo"), UsageUnit::GbMonth);
        assert_eq!(UsageUnit::parse("GB"), UsageUnit::Gigabytes);
        assert_eq!(UsageUnit::parse("1"), UsageUnit::Fixed);
        assert_eq!(
            UsageUnit::parse("vCPU-Hours"),
            UsageUnit::Other("vCPU-Hours".to_string())
        );
    }

    #[test]
    fn test_billed_quantity_metered() {
        assert_eq!(billed_quantity(2, 730.0, "Hrs"), 1460.0);
        assert_eq!(billed_quantity(3, 0.5, "GB-Mo"), 1.5);
    }

    #[test]
    fn test_billed_quantity_fixed_ignores_usage() {
        assert_eq!(billed_quantity(4, 730.0, "1"), 4.0);
    }

    #[test]
    fn test_default_usage() {
        assert_eq!(UsageUnit::Hours.default_usage(), HOURS_PER_MONTH);
        assert_eq!(UsageUnit::Fixed.default_usage(), 1.0);
        assert_eq!(UsageUnit::Hours.label(), "hours");
    }

    #[test]
    fn test_quantity_serialization() {
        #[derive(Serialize)]
        struct Line {
            #[serde(serialize_with = "serialize_quantity")]
            quantity: f64,
        }

        let whole = serde_json::to_string(&Line { quantity: 1460.0 }).unwrap();
        assert_eq!(whole, r#"{"quantity":1460}"#);

        let fractional = serde_json::to_string(&Line { quantity: 1.5 }).unwrap();
        assert_eq!(fractional, r#"{"quantity":1.5}"#);
    }
}
