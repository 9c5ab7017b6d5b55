//! The estimate cart.
//!
//! The cart holds priced resource selections until the user asks for a
//! calculation. It is owned by the application session and shared with the
//! chat tools through [`CartStore`], so a mutation made by a tool call is
//! visible to the next read.
//!
//! The cart snapshot lives in the workspace under a fixed key:
//! ```text
//! .priceyy/cart.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calculation::{CalculationItem, CalculationRequest};
use crate::error::{PricingError, PricingResult};
use crate::units::{billed_quantity, UsageUnit};

/// File name of the persisted cart snapshot.
pub const CART_KEY: &str = "cart.json";

/// A priced resource selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub provider: String,
    pub region: String,
    pub resource_type: String,
    pub price_model: String,
    pub unit_of_measure: String,
    pub price_per_unit: f64,
    /// Usage per instance, in `unit_of_measure`
    pub usage_quantity: f64,
    /// Number of instances
    pub count: u32,
}

impl CartItem {
    pub fn unit(&self) -> UsageUnit {
        UsageUnit::parse(&self.unit_of_measure)
    }

    /// Quantity sent to the pricing API for this line.
    pub fn billed_quantity(&self) -> f64 {
        billed_quantity(self.count, self.usage_quantity, &self.unit_of_measure)
    }

    /// Local estimate from the catalog price, before calling `/calculate`.
    pub fn estimated_cost(&self) -> f64 {
        self.price_per_unit * self.billed_quantity()
    }

    pub fn to_calculation_item(&self) -> CalculationItem {
        CalculationItem {
            provider: self.provider.clone(),
            region: self.region.clone(),
            resource_type: self.resource_type.clone(),
            price_model: self.price_model.clone(),
            unit_of_measure: self.unit_of_measure.clone(),
            quantity: self.billed_quantity(),
        }
    }

    /// Lines merge only when summing counts keeps every billed quantity intact.
    fn same_line(&self, other: &NewCartItem) -> bool {
        self.provider == other.provider
            && self.region == other.region
            && self.resource_type == other.resource_type
            && self.price_model == other.price_model
            && self.unit_of_measure == other.unit_of_measure
            && self.price_per_unit == other.price_per_unit
            && (self.unit().is_fixed() || self.usage_quantity == other.usage_quantity)
    }
}

/// A selection that is about to enter the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    pub provider: String,
    pub region: String,
    pub resource_type: String,
    pub price_model: String,
    pub unit_of_measure: String,
    pub price_per_unit: f64,
    pub usage_quantity: f64,
    pub count: u32,
}

impl NewCartItem {
    fn validate(&self) -> PricingResult<()> {
        for (field, value) in [
            ("provider", &self.provider),
            ("region", &self.region),
            ("resourceType", &self.resource_type),
            ("priceModel", &self.price_model),
            ("unitOfMeasure", &self.unit_of_measure),
        ] {
            if value.trim().is_empty() {
                return Err(PricingError::InvalidItem(format!("{} is required", field)));
            }
        }
        if !self.price_per_unit.is_finite() || self.price_per_unit < 0.0 {
            return Err(PricingError::InvalidItem(format!(
                "pricePerUnit must be a non-negative number, got {}",
                self.price_per_unit
            )));
        }
        validate_count(self.count)?;
        validate_usage(self.usage_quantity)?;
        Ok(())
    }
}

/// In-place edit of a cart line's quantities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantityUpdate {
    pub count: Option<u32>,
    pub usage_quantity: Option<f64>,
}

fn validate_count(count: u32) -> PricingResult<()> {
    if count == 0 {
        return Err(PricingError::InvalidItem("count must be at least 1".to_string()));
    }
    Ok(())
}

fn validate_usage(usage: f64) -> PricingResult<()> {
    if !usage.is_finite() || usage <= 0.0 {
        return Err(PricingError::InvalidItem(format!(
            "usageQuantity must be positive, got {}",
            usage
        )));
    }
    Ok(())
}

/// Ordered collection of cart lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Add a selection, merging it into an identical line by summing counts.
    ///
    /// A selection with a different usage or price gets its own line.
    pub fn add(&mut self, item: NewCartItem) -> PricingResult<CartItem> {
        item.validate()?;

        if let Some(existing) = self.items.iter_mut().find(|line| line.same_line(&item)) {
            existing.count = existing.count.saturating_add(item.count);
            debug!(id = %existing.id, count = existing.count, "Merged cart line");
            return Ok(existing.clone());
        }

        let line = CartItem {
            id: uuid::Uuid::new_v4().to_string(),
            provider: item.provider,
            region: item.region,
            resource_type: item.resource_type,
            price_model: item.price_model,
            unit_of_measure: item.unit_of_measure,
            price_per_unit: item.price_per_unit,
            usage_quantity: item.usage_quantity,
            count: item.count,
        };
        info!(
            id = %line.id,
            provider = %line.provider,
            region = %line.region,
            resource = %line.resource_type,
            "Added cart line"
        );
        self.items.push(line.clone());
        Ok(line)
    }

    /// Change the quantities of a line in place.
    pub fn update(&mut self, id: &str, update: QuantityUpdate) -> PricingResult<CartItem> {
        if let Some(count) = update.count {
            validate_count(count)?;
        }
        if let Some(usage) = update.usage_quantity {
            validate_usage(usage)?;
        }

        let line = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| PricingError::ItemNotFound(id.to_string()))?;

        if let Some(count) = update.count {
            line.count = count;
        }
        if let Some(usage) = update.usage_quantity {
            line.usage_quantity = usage;
        }
        debug!(id, count = line.count, usage = line.usage_quantity, "Updated cart line");
        Ok(line.clone())
    }

    pub fn remove(&mut self, id: &str) -> PricingResult<CartItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| PricingError::ItemNotFound(id.to_string()))?;
        let removed = self.items.remove(index);
        info!(id, "Removed cart line");
        Ok(removed)
    }

    /// Remove every line, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        info!(count, "Cleared cart");
        count
    }

    /// Sum of the local per-line estimates.
    pub fn estimated_total(&self) -> f64 {
        self.items.iter().map(CartItem::estimated_cost).sum()
    }

    pub fn calculation_request(&self) -> CalculationRequest {
        CalculationRequest {
            services: self.items.iter().map(CartItem::to_calculation_item).collect(),
        }
    }
}

/// Shared handle to the session's cart.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    inner: Arc<RwLock<Cart>>,
}

impl CartStore {
    pub fn new(cart: Cart) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cart)),
        }
    }

    /// Clone of the current cart.
    pub fn snapshot(&self) -> Cart {
        self.inner.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Cart) -> R) -> R {
        f(&*self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn add(&self, item: NewCartItem) -> PricingResult<CartItem> {
        self.write(|cart| cart.add(item))
    }

    pub fn len(&self) -> usize {
        self.read(Cart::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(Cart::is_empty)
    }
}

/// Persistence for the cart snapshot.
#[derive(Debug, Clone)]
pub struct CartPersistence {
    /// Root path of the workspace
    workspace_root: PathBuf,
}

impl CartPersistence {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    fn cart_path(&self) -> PathBuf {
        self.workspace_root.join(".priceyy").join(CART_KEY)
    }

    /// Load the saved cart, or an empty one if nothing was saved yet.
    pub fn load(&self) -> PricingResult<Cart> {
        let path = self.cart_path();
        if !path.exists() {
            return Ok(Cart::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, cart: &Cart) -> PricingResult<()> {
        let path = self.cart_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(cart)?;
        fs::write(&path, content)?;
        debug!("Saved cart to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn t2_micro(count: u32, usage: f64) -> NewCartItem {
        NewCartItem {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            resource_type: "t2.micro".to_string(),
            price_model: "OnDemand".to_string(),
            unit_of_measure: "Hrs".to_string(),
            price_per_unit: 0.0116,
            usage_quantity: usage,
            count,
        }
    }

    #[test]
    fn test_calculation_quantity_for_metered_line() {
        let mut cart = Cart::new();
        cart.add(t2_micro(2, 730.0)).unwrap();

        let request = cart.calculation_request();
        assert_eq!(request.services.len(), 1);
        assert_eq!(request.services[0].provider, "aws");
        assert_eq!(request.services[0].region, "us-east-1");
        assert_eq!(request.services[0].resource_type, "t2.micro");
        assert_eq!(request.services[0].quantity, 1460.0);
    }

    #[test]
    fn test_fixed_price_line_bills_count_only() {
        let mut cart = Cart::new();
        let mut item = t2_micro(3, 730.0);
        item.resource_type = "Elastic IP".to_string();
        item.unit_of_measure = "1".to_string();
        item.price_per_unit = 3.6;
        cart.add(item).unwrap();

        assert_eq!(cart.items()[0].billed_quantity(), 3.0);
        assert!((cart.estimated_total() - 10.8).abs() < 1e-9);
    }

    #[test]
    fn test_identical_lines_merge() {
        let mut cart = Cart::new();
        let first = cart.add(t2_micro(1, 730.0)).unwrap();
        let merged = cart.add(t2_micro(2, 730.0)).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(first.id, merged.id);
        assert_eq!(merged.count, 3);
    }

    #[test]
    fn test_different_usage_is_new_line() {
        let mut cart = Cart::new();
        cart.add(t2_micro(1, 730.0)).unwrap();
        cart.add(t2_micro(1, 8.0)).unwrap();

        assert_eq!(cart.len(), 2);
        let billed: f64 = cart
            .calculation_request()
            .services
            .iter()
            .map(|line| line.quantity)
            .sum();
        assert_eq!(billed, 738.0);
    }

    #[test]
    fn test_different_price_is_new_line() {
        let mut cart = Cart::new();
        cart.add(t2_micro(1, 730.0)).unwrap();
        let mut repriced = t2_micro(1, 730.0);
        repriced.price_per_unit = 0.0120;
        cart.add(repriced).unwrap();

        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_fixed_price_lines_merge_regardless_of_usage() {
        let mut cart = Cart::new();
        let mut first = t2_micro(1, 730.0);
        first.unit_of_measure = "1".to_string();
        let mut second = first.clone();
        second.usage_quantity = 1.0;
        cart.add(first).unwrap();
        cart.add(second).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].billed_quantity(), 2.0);
    }

    #[test]
    fn test_different_price_model_is_new_line() {
        let mut cart = Cart::new();
        cart.add(t2_micro(1, 730.0)).unwrap();
        let mut reserved = t2_micro(1, 730.0);
        reserved.price_model = "Reserved".to_string();
        cart.add(reserved).unwrap();

        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_update_in_place() {
        let mut cart = Cart::new();
        let line = cart.add(t2_micro(1, 730.0)).unwrap();

        let updated = cart
            .update(
                &line.id,
                QuantityUpdate {
                    count: Some(4),
                    usage_quantity: Some(24.0),
                },
            )
            .unwrap();

        assert_eq!(updated.count, 4);
        assert_eq!(cart.get(&line.id).unwrap().usage_quantity, 24.0);
        assert_eq!(cart.items()[0].billed_quantity(), 96.0);
    }

    #[test]
    fn test_rejects_invalid_quantities() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.add(t2_micro(0, 730.0)),
            Err(PricingError::InvalidItem(_))
        ));
        assert!(matches!(
            cart.add(t2_micro(1, -5.0)),
            Err(PricingError::InvalidItem(_))
        ));

        let line = cart.add(t2_micro(1, 1.0)).unwrap();
        let result = cart.update(
            &line.id,
            QuantityUpdate {
                count: Some(0),
                usage_quantity: None,
            },
        );
        assert!(result.is_err());
        assert_eq!(cart.get(&line.id).unwrap().count, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        let line = cart.add(t2_micro(1, 730.0)).unwrap();
        let mut other = t2_micro(1, 100.0);
        other.resource_type = "t3.small".to_string();
        cart.add(other).unwrap();

        cart.remove(&line.id).unwrap();
        assert_eq!(cart.len(), 1);
        assert!(matches!(
            cart.remove(&line.id),
            Err(PricingError::ItemNotFound(_))
        ));

        assert_eq!(cart.clear(), 1);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_store_shares_mutations() {
        let store = CartStore::default();
        let handle = store.clone();

        handle.add(t2_micro(2, 730.0)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot().items()[0].count, 2);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let temp = tempdir().unwrap();
        let persistence = CartPersistence::new(temp.path());

        assert!(persistence.load().unwrap().is_empty());

        let mut cart = Cart::new();
        cart.add(t2_micro(2, 730.0)).unwrap();
        persistence.save(&cart).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, cart);
        assert!(temp.path().join(".priceyy").join(CART_KEY).exists());
    }
}
