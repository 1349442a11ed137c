//! Storage seam for products and their reservations.
//!
//! Every mutating call is one atomic unit: it either applies all of its
//! writes to the product counters and the reservation ledger, or none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::messages;

use crate::error::{InventoryError, Result};
use crate::models::Product;
use crate::reservation::{Reservation, StockLevels};

pub mod memory;
pub mod postgres;

pub use memory::MemoryInventoryStore;
pub use postgres::PgInventoryStore;

/// Longest identifier the schema accepts.
pub const MAX_ID_LEN: usize = 255;

#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    async fn create_product(&self, product: NewProduct, now: DateTime<Utc>) -> Result<Product>;

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>>;

    async fn list_products(&self, filter: StockFilter, page: PageRequest) -> Result<Vec<Product>>;

    async fn update_product(
        &self,
        product_id: &str,
        changes: StockChanges,
        now: DateTime<Utc>,
    ) -> Result<Product>;

    async fn delete_product(&self, product_id: &str) -> Result<()>;

    async fn reserve(&self, request: ReserveStock, now: DateTime<Utc>) -> Result<Reservation>;

    async fn release(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation>;

    async fn deduct(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation>;

    /// Releases every reservation whose lease lapsed before `now`. Returns the
    /// rows this call moved; rows handled by a concurrent sweep are skipped.
    async fn expire_all(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>>;

    async fn active_reservation(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Option<Reservation>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub product_id: String,
    pub stock: i32,
    pub reserved_stock: i32,
}

/// Fields of a stock edit; `None` leaves the column as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockChanges {
    pub stock: Option<i32>,
    pub reserved_stock: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveStock {
    pub product_id: String,
    pub holder_id: String,
    pub quantity: i32,
}

/// Identifies the single reservation a holder may keep on a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderKey {
    pub product_id: String,
    pub holder_id: String,
}

/// Listing filter on `stock`. An exact value wins over a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StockFilter {
    #[default]
    Any,
    Exact(i32),
    Range {
        min: Option<i32>,
        max: Option<i32>,
    },
}

/// 1-indexed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub page: i64,
}

fn check_id(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() || value.len() > MAX_ID_LEN {
        return Err(InventoryError::validation(message));
    }
    Ok(())
}

fn check_count(value: i32, message: &str) -> Result<()> {
    if value < 0 {
        return Err(InventoryError::validation(message));
    }
    Ok(())
}

impl NewProduct {
    pub fn levels(&self) -> StockLevels {
        StockLevels::new(self.stock, self.reserved_stock)
    }

    pub fn validate(&self) -> Result<()> {
        check_id(&self.product_id, messages::INVALID_PRODUCT_DATA)?;
        check_count(self.stock, messages::INVALID_PRODUCT_DATA)?;
        check_count(self.reserved_stock, messages::INVALID_PRODUCT_DATA)?;
        if !self.levels().is_consistent() {
            return Err(InventoryError::validation(messages::RESERVED_EXCEEDS_STOCK));
        }
        Ok(())
    }
}

impl StockChanges {
    pub fn is_empty(&self) -> bool {
        self.stock.is_none() && self.reserved_stock.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(InventoryError::validation(messages::STOCK_OR_RESERVED_STOCK_REQUIRED));
        }
        for value in [self.stock, self.reserved_stock].into_iter().flatten() {
            check_count(value, messages::INVALID_STOCK_OR_RESERVED_STOCK)?;
        }
        Ok(())
    }

    /// Merges the edit onto `current`, refusing results that would hold more
    /// than is in stock.
    pub fn apply_to(&self, current: StockLevels) -> Result<StockLevels> {
        let merged = StockLevels::new(
            self.stock.unwrap_or(current.stock),
            self.reserved_stock.unwrap_or(current.reserved_stock),
        );
        if !merged.is_consistent() {
            return Err(InventoryError::validation(messages::RESERVED_EXCEEDS_STOCK));
        }
        Ok(merged)
    }
}

impl ReserveStock {
    pub fn key(&self) -> HolderKey {
        HolderKey {
            product_id: self.product_id.clone(),
            holder_id: self.holder_id.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.key().validate()?;
        if self.quantity <= 0 {
            return Err(InventoryError::validation(messages::INVALID_PRODUCT_ID_OR_QUANTITY));
        }
        Ok(())
    }
}

impl HolderKey {
    pub fn new(product_id: impl Into<String>, holder_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            holder_id: holder_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_id(&self.product_id, messages::PRODUCT_ID_REQUIRED)?;
        check_id(&self.holder_id, messages::HOLDER_ID_REQUIRED)
    }

    pub fn reservation_not_found(&self) -> InventoryError {
        InventoryError::ReservationNotFound {
            product_id: self.product_id.clone(),
            holder_id: self.holder_id.clone(),
        }
    }

    pub fn no_active_reservation(&self) -> InventoryError {
        InventoryError::NoActiveReservation {
            product_id: self.product_id.clone(),
            holder_id: self.holder_id.clone(),
        }
    }
}

impl StockFilter {
    pub fn validate(&self) -> Result<()> {
        let values = match *self {
            StockFilter::Any => [None, None],
            StockFilter::Exact(stock) => [Some(stock), None],
            StockFilter::Range { min, max } => [min, max],
        };
        for value in values.into_iter().flatten() {
            check_count(value, messages::INVALID_STOCK_VALUE)?;
        }
        Ok(())
    }

    pub fn matches(&self, stock: i32) -> bool {
        match *self {
            StockFilter::Any => true,
            StockFilter::Exact(value) => stock == value,
            StockFilter::Range { min, max } => {
                min.map_or(true, |min| stock >= min) && max.map_or(true, |max| stock <= max)
            }
        }
    }
}

impl PageRequest {
    pub fn validate(&self) -> Result<()> {
        if self.limit <= 0 || self.page <= 0 {
            return Err(InventoryError::validation(messages::INVALID_PAGINATION));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_filter_is_inclusive() {
        let filter = StockFilter::Range {
            min: Some(5),
            max: Some(10),
        };
        assert!(filter.matches(5));
        assert!(filter.matches(10));
        assert!(!filter.matches(4));
        assert!(!filter.matches(11));
        assert!(StockFilter::Range { min: None, max: Some(3) }.matches(0));
    }

    #[test]
    fn stock_changes_keep_reserved_within_stock() {
        let current = StockLevels::new(10, 4);
        let lower = StockChanges {
            stock: Some(3),
            reserved_stock: None,
        };
        assert!(matches!(lower.apply_to(current), Err(InventoryError::Validation(_))));

        let both = StockChanges {
            stock: Some(3),
            reserved_stock: Some(2),
        };
        assert_eq!(both.apply_to(current).unwrap(), StockLevels::new(3, 2));
    }

    #[test]
    fn empty_changes_are_rejected() {
        assert!(StockChanges::default().validate().is_err());
    }

    #[test]
    fn store_inputs_revalidate() {
        let product = NewProduct {
            product_id: " ".into(),
            stock: 1,
            reserved_stock: 0,
        };
        assert!(product.validate().is_err());

        let reserve = ReserveStock {
            product_id: "P1".into(),
            holder_id: "u1".into(),
            quantity: 0,
        };
        assert!(reserve.validate().is_err());
        assert!(StockFilter::Exact(-1).validate().is_err());
    }

    #[test]
    fn offset_counts_from_page_one() {
        assert_eq!(PageRequest { limit: 10, page: 1 }.offset(), 0);
        assert_eq!(PageRequest { limit: 10, page: 3 }.offset(), 20);
    }

    #[test]
    fn non_positive_pages_are_rejected() {
        let err = PageRequest { limit: 0, page: 1 }.validate().unwrap_err();
        assert_eq!(err.to_string(), messages::INVALID_PAGINATION);
        assert!(PageRequest { limit: 5, page: -1 }.validate().is_err());
    }
}
