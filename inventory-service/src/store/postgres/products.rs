//! Queries against the `inventory` table.

use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::error::InventoryError;
use crate::models::Product;
use crate::reservation::StockLevels;
use crate::schema::inventory;
use crate::store::{PageRequest, StockFilter};

pub async fn find(conn: &mut AsyncPgConnection, product_id: &str) -> QueryResult<Option<Product>> {
    inventory::table
        .find(product_id)
        .first::<Product>(conn)
        .await
        .optional()
}

/// Reads the product and holds its row lock until the transaction ends.
pub async fn lock(conn: &mut AsyncPgConnection, product_id: &str) -> QueryResult<Option<Product>> {
    inventory::table
        .find(product_id)
        .for_update()
        .first::<Product>(conn)
        .await
        .optional()
}

pub async fn require_locked(conn: &mut AsyncPgConnection, product_id: &str) -> Result<Product, InventoryError> {
    lock(conn, product_id)
        .await?
        .ok_or_else(|| InventoryError::ProductNotFound(product_id.to_string()))
}

pub async fn insert(conn: &mut AsyncPgConnection, product: &Product) -> Result<Product, InventoryError> {
    diesel::insert_into(inventory::table)
        .values(product)
        .get_result::<Product>(conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                InventoryError::ProductExists(product.product_id.clone())
            }
            other => other.into(),
        })
}

pub async fn list(conn: &mut AsyncPgConnection, filter: StockFilter, page: PageRequest) -> QueryResult<Vec<Product>> {
    let mut query: inventory::BoxedQuery<'_, Pg> = inventory::table.into_boxed();
    match filter {
        StockFilter::Any => {}
        StockFilter::Exact(stock) => query = query.filter(inventory::stock.eq(stock)),
        StockFilter::Range { min, max } => {
            if let Some(min) = min {
                query = query.filter(inventory::stock.ge(min));
            }
            if let Some(max) = max {
                query = query.filter(inventory::stock.le(max));
            }
        }
    }

    query
        .order(inventory::product_id.asc())
        .limit(page.limit)
        .offset(page.offset())
        .load::<Product>(conn)
        .await
}

/// Adds `quantity` to the hold only when the unreserved stock covers all of
/// it. The check and the increment run as one statement, so two holders can
/// never both take the last units. The guard subtracts rather than adds so a
/// huge `quantity` cannot overflow the column type. Returns the number of
/// rows changed.
pub async fn try_reserve(
    conn: &mut AsyncPgConnection,
    product_id: &str,
    quantity: i32,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    diesel::update(
        inventory::table
            .filter(inventory::product_id.eq(product_id))
            .filter((inventory::stock - inventory::reserved_stock).ge(quantity)),
    )
    .set((
        inventory::reserved_stock.eq(inventory::reserved_stock + quantity),
        inventory::updated_at.eq(now),
    ))
    .execute(conn)
    .await
}

pub async fn write_levels(
    conn: &mut AsyncPgConnection,
    product_id: &str,
    levels: StockLevels,
    now: DateTime<Utc>,
) -> QueryResult<Product> {
    diesel::update(inventory::table.find(product_id))
        .set((
            inventory::stock.eq(levels.stock),
            inventory::reserved_stock.eq(levels.reserved_stock),
            inventory::updated_at.eq(now),
        ))
        .get_result::<Product>(conn)
        .await
}

pub async fn delete(conn: &mut AsyncPgConnection, product_id: &str) -> QueryResult<usize> {
    diesel::delete(inventory::table.find(product_id)).execute(conn).await
}
