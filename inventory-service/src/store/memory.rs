use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{HolderKey, InventoryStore, NewProduct, PageRequest, ReserveStock, StockChanges, StockFilter};
use crate::error::{InventoryError, Result};
use crate::models::Product;
use crate::reservation::{Reservation, ReservationStatus, Transition};

/// In-process store. One mutex guards both tables, so every call sees and
/// leaves a consistent snapshot.
#[derive(Default)]
pub struct MemoryInventoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    products: BTreeMap<String, Product>,
    reservations: HashMap<HolderKey, Reservation>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reservation record for a pair in any state.
    pub async fn reservation(&self, key: &HolderKey) -> Option<Reservation> {
        self.state.lock().await.reservations.get(key).cloned()
    }
}

impl MemoryState {
    fn transition(&mut self, key: HolderKey, transition: Transition, now: DateTime<Utc>) -> Result<Reservation> {
        let product = self
            .products
            .get_mut(&key.product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(key.product_id.clone()))?;
        let reservation = self
            .reservations
            .get_mut(&key)
            .ok_or_else(|| key.no_active_reservation())?;

        let levels = reservation
            .apply(transition, product.levels(), now)
            .ok_or_else(|| key.no_active_reservation())?;
        product.set_levels(levels, now);
        Ok(reservation.clone())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn create_product(&self, product: NewProduct, now: DateTime<Utc>) -> Result<Product> {
        product.validate()?;
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.product_id) {
            return Err(InventoryError::ProductExists(product.product_id));
        }
        let created = Product::new(product.product_id.clone(), product.levels(), now);
        state.products.insert(product.product_id, created.clone());
        Ok(created)
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(product_id).cloned())
    }

    async fn list_products(&self, filter: StockFilter, page: PageRequest) -> Result<Vec<Product>> {
        filter.validate()?;
        page.validate()?;
        let state = self.state.lock().await;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit).unwrap_or(usize::MAX);
        Ok(state
            .products
            .values()
            .filter(|product| filter.matches(product.stock))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn update_product(&self, product_id: &str, changes: StockChanges, now: DateTime<Utc>) -> Result<Product> {
        changes.validate()?;
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.to_string()))?;
        let levels = changes.apply_to(product.levels())?;
        product.set_levels(levels, now);
        Ok(product.clone())
    }

    async fn delete_product(&self, product_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(product_id) {
            return Err(InventoryError::ProductNotFound(product_id.to_string()));
        }
        let held = state
            .reservations
            .values()
            .any(|r| r.product_id == product_id && r.status == ReservationStatus::Reserved);
        if held {
            return Err(InventoryError::ActiveReservations(product_id.to_string()));
        }
        state.reservations.retain(|key, _| key.product_id != product_id);
        state.products.remove(product_id);
        Ok(())
    }

    async fn reserve(&self, request: ReserveStock, now: DateTime<Utc>) -> Result<Reservation> {
        request.validate()?;
        let mut state = self.state.lock().await;
        let MemoryState { products, reservations } = &mut *state;

        let product = products
            .get_mut(&request.product_id)
            .ok_or_else(|| InventoryError::ProductNotFound(request.product_id.clone()))?;
        let levels = product
            .levels()
            .reserve(request.quantity)
            .ok_or_else(|| InventoryError::InsufficientStock {
                product_id: request.product_id.clone(),
                requested: request.quantity,
                available: product.levels().available(),
            })?;
        product.set_levels(levels, now);

        let reservation = reservations
            .entry(request.key())
            .and_modify(|existing| existing.renew(request.quantity, now))
            .or_insert_with(|| {
                Reservation::new(request.product_id.clone(), request.holder_id.clone(), request.quantity, now)
            });
        Ok(reservation.clone())
    }

    async fn release(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation> {
        key.validate()?;
        self.state.lock().await.transition(key, Transition::Release, now)
    }

    async fn deduct(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Reservation> {
        key.validate()?;
        self.state.lock().await.transition(key, Transition::Commit, now)
    }

    async fn expire_all(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let mut state = self.state.lock().await;
        let mut expired: Vec<HolderKey> = state
            .reservations
            .iter()
            .filter(|(_, r)| r.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();

        let mut released = Vec::with_capacity(expired.len());
        for key in expired {
            released.push(state.transition(key, Transition::Expire, now)?);
        }
        Ok(released)
    }

    async fn active_reservation(&self, key: HolderKey, now: DateTime<Utc>) -> Result<Option<Reservation>> {
        key.validate()?;
        let state = self.state.lock().await;
        Ok(state.reservations.get(&key).filter(|r| r.is_active(now)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    async fn store_with(product_id: &str, stock: i32) -> MemoryInventoryStore {
        let store = MemoryInventoryStore::new();
        store
            .create_product(
                NewProduct {
                    product_id: product_id.into(),
                    stock,
                    reserved_stock: 0,
                },
                now(),
            )
            .await
            .unwrap();
        store
    }

    fn reserve(holder: &str, quantity: i32) -> ReserveStock {
        ReserveStock {
            product_id: "P1".into(),
            holder_id: holder.into(),
            quantity,
        }
    }

    #[tokio::test]
    async fn failed_reserve_leaves_no_record() {
        let store = store_with("P1", 3).await;
        let err = store.reserve(reserve("u1", 4), now()).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { available: 3, .. }));
        assert!(store.reservation(&HolderKey::new("P1", "u1")).await.is_none());
        assert_eq!(store.get_product("P1").await.unwrap().unwrap().reserved_stock, 0);
    }

    #[tokio::test]
    async fn delete_drops_terminal_history() {
        let store = store_with("P1", 3).await;
        store.reserve(reserve("u1", 1), now()).await.unwrap();
        store.deduct(HolderKey::new("P1", "u1"), now()).await.unwrap();

        store.delete_product("P1").await.unwrap();
        assert!(store.reservation(&HolderKey::new("P1", "u1")).await.is_none());
    }

    #[tokio::test]
    async fn expire_skips_unexpired_and_terminal_rows() {
        let store = store_with("P1", 10).await;
        store.reserve(reserve("u1", 2), now()).await.unwrap();
        store.reserve(reserve("u2", 3), now() + Duration::minutes(10)).await.unwrap();
        store.reserve(reserve("u3", 1), now()).await.unwrap();
        store.release(HolderKey::new("P1", "u3"), now()).await.unwrap();

        let released = store.expire_all(now() + Duration::minutes(16)).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].holder_id, "u1");
        assert_eq!(store.get_product("P1").await.unwrap().unwrap().reserved_stock, 3);
    }
}
