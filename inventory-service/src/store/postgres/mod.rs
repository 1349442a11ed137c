//! Postgres store on diesel-async.
//!
//! Each operation checks out one pooled connection and runs inside a single
//! transaction. Locks are always taken product row first, reservation row
//! second, so concurrent operations on one product queue up instead of
//! deadlocking. Any error inside the closure rolls the whole unit back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use tracing::{debug, error};

use super::{HolderKey, InventoryStore, NewProduct, PageRequest, ReserveStock, StockChanges, StockFilter};
use crate::error::{InventoryError, Result, StorageError};
use crate::models::Product;
use crate::reservation::{Reservation, Transition};

pub mod ledger;
pub mod products;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgInventoryStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgInventoryStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// A failed checkout returns before any transaction exists, so there is
    /// nothing to roll back on that path.
    async fn connection(&self) -> Result<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.map_err(|e| {
            let err = StorageError::from(e);
            error!("Failed to check out database connection: {}", err);
            InventoryError::from(err)
        })
    }

    /// Bounds an operation by the configured timeout. Dropping the pending
    /// transaction leaves it uncommitted.
    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                error!("Database operation timed out after {:?}", self.timeout);
                Err(StorageError::Timeout(self.timeout).into())
            }
        }
    }

    /// Shared body of release, deduct and a single expiry.
    async fn transition(
        conn: &mut AsyncPgConnection,
        key: HolderKey,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        let product = products::require_locked(conn, &key.product_id).await?;
        let row = ledger::lock_for_pair(conn, &key)
            .await?
            .ok_or_else(|| key.no_active_reservation())?;

        let mut reservation = Reservation::try_from(row)?;
        let levels = reservation
            .apply(transition, product.levels(), now)
            .ok_or_else(|| key.no_active_reservation())?;

        products::write_levels(conn, &key.product_id, levels, now).await?;
        ledger::save(conn, &reservation).await?;
        Ok(reservation)
    }

    /// Expires one reservation in its own transaction. `None` when another
    /// caller already moved it.
    async fn expire_one(&self, id: uuid::Uuid, product_id: String, now: DateTime<Utc>) -> Result<Option<Reservation>> {
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move {
                let product = match products::lock(conn, &product_id).await? {
                    Some(product) => product,
                    None => return Ok(None),
                };
                let mut reservation = match ledger::lock_by_id(conn, id).await? {
                    Some(row) => Reservation::try_from(row)?,
                    None => return Ok(None),
                };
                let levels = match reservation.apply(Transition::Expire, product.levels(), now) {
                    Some(levels) => levels,
                    None => return Ok(None),
                };
                products::write_levels(conn, &product_id, levels, now).await?;
                ledger::save(conn, &reservation).await?;
                Ok(Some(reservation))
            })
        });
        self.bounded(operation).await
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn create_product(&self, product: NewProduct, now: DateTime<Utc>) -> Result<Product> {
        product.validate()?;
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move {
                if products::find(conn, &product.product_id).await?.is_some() {
                    return Err(InventoryError::ProductExists(product.product_id));
                }
                let row = Product::new(product.product_id.clone(), product.levels(), now);
                products::insert(conn, &row).await
            })
        });
        self.bounded(operation).await
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let mut conn = self.connection().await?;
        self.bounded(async { products::find(&mut conn, product_id).await.map_err(InventoryError::from) })
            .await
    }

    async fn list_products(&self, filter: StockFilter, page: PageRequest) -> Result<Vec<Product>> {
        filter.validate()?;
        page.validate()?;
        let mut conn = self.connection().await?;
        self.bounded(async { products::list(&mut conn, filter, page).await.map_err(InventoryError::from) })
            .await
    }

    async fn update_product(&self, product_id: &str, changes: StockChanges, now: DateTime<Utc>) -> Result<Product> {
        changes.validate()?;
        let product_id = product_id.to_string();
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move {
                let current = products::require_locked(conn, &product_id).await?;
                let levels = changes.apply_to(current.levels())?;
                Ok(products::write_levels(conn, &product_id, levels, now).await?)
            })
        });
        self.bounded(operation).await
    }

    async fn delete_product(&self, product_id: &str) -> Result<()> {
        let product_id = product_id.to_string();
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move {
                products::require_locked(conn, &product_id).await?;
                if ledger::count_held(conn, &product_id).await? > 0 {
                    return Err(InventoryError::ActiveReservations(product_id));
                }
                let history = ledger::delete_for_product(conn, &product_id).await?;
                debug!("Removed {} settled reservations of product {}", history, product_id);
                products::delete(conn, &product_id).await?;
                Ok(())
            })
        });
        self.bounded(operation).await
    }

    async fn reserve(&self, request: ReserveStock, now: DateTime<Utc>) -> Result<Reservation> {
        request.validate()?;
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move {
                let claimed = products::try_reserve(conn, &request.product_id, request.quantity, now).await?;
                if claimed == 0 {
                    return Err(match products::find(conn, &request.product_id).await? {
                        None => InventoryError::ProductNotFound(request.product_id),
                        Some(product) => InventoryError::InsufficientStock {
                            product_id: request.product_id,
                            requested: request.quantity,
                            available: product.levels().available(),
                        },
                    });
                }

                let key = request.key();
                let saved = match ledger::lock_for_pair(conn, &key).await? {
                    Some(row) => {
                        let mut reservation = Reservation::try_from(row)?;
                        reservation.renew(request.quantity, now);
                        ledger::save(conn, &reservation).await?
                    }
                    None => {
                        let reservation =
                            Reservation::new(request.product_id, request.holder_id, request.quantity, now);
                        ledger::insert(conn, &reservation).await?
                    }
                };
                Reservation::try_from(saved)
            })
        });
        self.bounded(operation).await
    }

    async fn release(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation> {
        key.validate()?;
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move { Self::transition(conn, key, Transition::Release, now).await })
        });
        self.bounded(operation).await
    }

    async fn deduct(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation> {
        key.validate()?;
        let mut conn = self.connection().await?;
        let operation = conn.transaction::<_, InventoryError, _>(|conn| {
            Box::pin(async move { Self::transition(conn, key, Transition::Commit, now).await })
        });
        self.bounded(operation).await
    }

    async fn expire_all(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let candidates = {
            let mut conn = self.connection().await?;
            self.bounded(async { ledger::expired(&mut conn, now).await.map_err(InventoryError::from) })
                .await?
        };

        let mut released = Vec::with_capacity(candidates.len());
        for (id, product_id) in candidates {
            if let Some(reservation) = self.expire_one(id, product_id, now).await? {
                released.push(reservation);
            }
        }
        Ok(released)
    }

    async fn active_reservation(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Option<Reservation>> {
        key.validate()?;
        let mut conn = self.connection().await?;
        let row = self
            .bounded(async { ledger::find_active(&mut conn, &key, now).await.map_err(InventoryError::from) })
            .await?;
        row.map(Reservation::try_from).transpose()
    }
}
