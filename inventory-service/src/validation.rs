//! Turns raw request values into typed store inputs.
//!
//! Everything here runs before the store is touched. Pagination is lenient
//! (bad values fall back to defaults); filters and counts are strict.

use serde_json::Value;
use shared::{messages, CreateProductRequest, ListProductsQuery, UpdateProductRequest};

use crate::error::{InventoryError, Result};
use crate::store::{NewProduct, PageRequest, StockChanges, StockFilter, MAX_ID_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub limit: i64,
    pub page: i64,
    pub max_limit: i64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            limit: 10,
            page: 1,
            max_limit: 100,
        }
    }
}

pub fn identifier(value: Option<&str>, message: &str) -> Result<String> {
    match value.map(str::trim) {
        Some(id) if !id.is_empty() && id.len() <= MAX_ID_LEN => Ok(id.to_string()),
        _ => Err(InventoryError::validation(message)),
    }
}

/// Accepts JSON integers and integer strings in `0..=i32::MAX`.
pub fn count(value: &Value) -> Option<i32> {
    let parsed = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    i32::try_from(parsed).ok().filter(|n| *n >= 0)
}

fn query_count(value: Option<&str>) -> Result<Option<i32>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|n| *n >= 0)
            .map(Some)
            .ok_or_else(|| InventoryError::validation(messages::INVALID_STOCK_VALUE)),
    }
}

pub fn stock_filter(query: &ListProductsQuery) -> Result<StockFilter> {
    let stock = query_count(query.stock.as_deref())?;
    let min = query_count(query.min_stock.as_deref())?;
    let max = query_count(query.max_stock.as_deref())?;

    Ok(match (stock, min, max) {
        (Some(stock), _, _) => StockFilter::Exact(stock),
        (None, None, None) => StockFilter::Any,
        (None, min, max) => StockFilter::Range { min, max },
    })
}

pub fn page_request(query: &ListProductsQuery, defaults: PageDefaults) -> PageRequest {
    let positive = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0);

    PageRequest {
        limit: positive(query.limit.as_deref())
            .unwrap_or(defaults.limit)
            .min(defaults.max_limit),
        page: positive(query.page.as_deref()).unwrap_or(defaults.page),
    }
}

pub fn new_product(request: &CreateProductRequest) -> Result<NewProduct> {
    let invalid = || InventoryError::validation(messages::INVALID_PRODUCT_DATA);

    let product_id = identifier(request.product_id.as_deref(), messages::INVALID_PRODUCT_DATA)?;
    let stock = request.stock.as_ref().and_then(count).ok_or_else(invalid)?;
    let reserved_stock = match &request.reserved_stock {
        None | Some(Value::Null) => 0,
        Some(value) => count(value).ok_or_else(invalid)?,
    };

    let product = NewProduct {
        product_id,
        stock,
        reserved_stock,
    };
    product.validate()?;
    Ok(product)
}

pub fn stock_changes(request: &UpdateProductRequest) -> Result<StockChanges> {
    let field = |value: &Option<Value>| -> Result<Option<i32>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => count(value)
                .map(Some)
                .ok_or_else(|| InventoryError::validation(messages::INVALID_STOCK_OR_RESERVED_STOCK)),
        }
    };

    let changes = StockChanges {
        stock: field(&request.stock)?,
        reserved_stock: field(&request.reserved_stock)?,
    };
    changes.validate()?;
    Ok(changes)
}

/// Reservation size; zero and negatives are rejected.
pub fn quantity(value: Option<&Value>) -> Result<i32> {
    value
        .and_then(count)
        .filter(|q| *q > 0)
        .ok_or_else(|| InventoryError::validation(messages::INVALID_PRODUCT_ID_OR_QUANTITY))
}
