use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{InventoryError, Result};
use crate::models::Product;
use crate::reservation::Reservation;
use crate::store::{HolderKey, InventoryStore, NewProduct, PageRequest, ReserveStock, StockChanges, StockFilter};

/// Entry point for callers: stamps every operation with the clock and logs
/// its outcome. Typed failures pass through untouched.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn with_system_clock(store: Arc<dyn InventoryStore>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    pub async fn list_products(&self, filter: StockFilter, page: PageRequest) -> Result<Vec<Product>> {
        self.store.list_products(filter, page).await.map_err(|e| log_failure("list products", e))
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Product> {
        self.store
            .get_product(product_id)
            .await
            .map_err(|e| log_failure("fetch product", e))?
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.to_string()))
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let created = self
            .store
            .create_product(product, self.clock.now())
            .await
            .map_err(|e| log_failure("add product", e))?;
        info!("Product {} added with stock {}", created.product_id, created.stock);
        Ok(created)
    }

    pub async fn update_product(&self, product_id: &str, changes: StockChanges) -> Result<Product> {
        let updated = self
            .store
            .update_product(product_id, changes, self.clock.now())
            .await
            .map_err(|e| log_failure("update product", e))?;
        info!(
            "Product {} updated: stock {}, reserved {}",
            updated.product_id, updated.stock, updated.reserved_stock
        );
        Ok(updated)
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<()> {
        self.store
            .delete_product(product_id)
            .await
            .map_err(|e| log_failure("delete product", e))?;
        info!("Product {} deleted", product_id);
        Ok(())
    }

    pub async fn reserve(&self, request: ReserveStock) -> Result<Reservation> {
        let reservation = self
            .store
            .reserve(request, self.clock.now())
            .await
            .map_err(|e| log_failure("reserve stock", e))?;
        info!(
            "Reserved {} of product {} for holder {} until {}",
            reservation.quantity, reservation.product_id, reservation.holder_id, reservation.expires_at
        );
        Ok(reservation)
    }

    pub async fn release(&self, key: HolderKey) -> Result<Reservation> {
        let reservation = self
            .store
            .release(key, self.clock.now())
            .await
            .map_err(|e| log_failure("release reserved stock", e))?;
        info!(
            "Released {} of product {} held by {}",
            reservation.quantity, reservation.product_id, reservation.holder_id
        );
        Ok(reservation)
    }

    pub async fn deduct(&self, key: HolderKey) -> Result<Reservation> {
        let reservation = self
            .store
            .deduct(key, self.clock.now())
            .await
            .map_err(|e| log_failure("deduct stock", e))?;
        info!(
            "Deducted {} of product {} for holder {}",
            reservation.quantity, reservation.product_id, reservation.holder_id
        );
        Ok(reservation)
    }

    pub async fn expire_all(&self) -> Result<Vec<Reservation>> {
        let released = self
            .store
            .expire_all(self.clock.now())
            .await
            .map_err(|e| log_failure("release expired reservations", e))?;
        if !released.is_empty() {
            info!("Released {} expired reservations", released.len());
        }
        Ok(released)
    }

    pub async fn active_reservation(&self, key: HolderKey) -> Result<Reservation> {
        let not_found = key.reservation_not_found();
        self.store
            .active_reservation(key, self.clock.now())
            .await
            .map_err(|e| log_failure("fetch reservation", e))?
            .ok_or(not_found)
    }
}

fn log_failure(operation: &str, err: InventoryError) -> InventoryError {
    match &err {
        InventoryError::Storage(_) => error!("Error trying to {}: {}", operation, err),
        _ => warn!("Could not {}: {}", operation, err),
    }
    err
}
