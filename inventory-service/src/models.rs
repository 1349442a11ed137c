use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{InventoryError, StorageError};
use crate::reservation::{Reservation, ReservationStatus, StockLevels};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::inventory)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub stock: i32,
    pub reserved_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::inventory_reservations)]
pub struct DbReservation {
    pub id: Uuid,
    pub product_id: String,
    pub holder_id: String,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(product_id: String, levels: StockLevels, now: DateTime<Utc>) -> Self {
        Self {
            product_id,
            stock: levels.stock,
            reserved_stock: levels.reserved_stock,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn levels(&self) -> StockLevels {
        StockLevels {
            stock: self.stock,
            reserved_stock: self.reserved_stock,
        }
    }

    pub fn set_levels(&mut self, levels: StockLevels, now: DateTime<Utc>) {
        self.stock = levels.stock;
        self.reserved_stock = levels.reserved_stock;
        self.updated_at = now;
    }
}

impl From<&Reservation> for DbReservation {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            product_id: reservation.product_id.clone(),
            holder_id: reservation.holder_id.clone(),
            quantity: reservation.quantity,
            expires_at: reservation.expires_at,
            status: reservation.status.as_str().to_string(),
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}

impl TryFrom<DbReservation> for Reservation {
    type Error = InventoryError;

    fn try_from(row: DbReservation) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ReservationStatus>()
            .map_err(|_| StorageError::CorruptRow(format!("reservation {} has status {:?}", row.id, row.status)))?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            holder_id: row.holder_id,
            quantity: row.quantity,
            expires_at: row.expires_at,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
