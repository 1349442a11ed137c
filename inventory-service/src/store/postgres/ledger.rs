//! Queries against the `inventory_reservations` table.
//!
//! Uniqueness of (product_id, holder_id) and the link to `inventory` are
//! enforced by the schema; the writes here never rely on conflict clauses.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::models::DbReservation;
use crate::reservation::{Reservation, ReservationStatus};
use crate::schema::inventory_reservations;
use crate::store::HolderKey;

/// Row for the pair in any state, locked for the rest of the transaction.
pub async fn lock_for_pair(conn: &mut AsyncPgConnection, key: &HolderKey) -> QueryResult<Option<DbReservation>> {
    inventory_reservations::table
        .filter(inventory_reservations::product_id.eq(key.product_id.as_str()))
        .filter(inventory_reservations::holder_id.eq(key.holder_id.as_str()))
        .for_update()
        .first::<DbReservation>(conn)
        .await
        .optional()
}

pub async fn lock_by_id(conn: &mut AsyncPgConnection, id: Uuid) -> QueryResult<Option<DbReservation>> {
    inventory_reservations::table
        .find(id)
        .for_update()
        .first::<DbReservation>(conn)
        .await
        .optional()
}

pub async fn find_active(
    conn: &mut AsyncPgConnection,
    key: &HolderKey,
    now: DateTime<Utc>,
) -> QueryResult<Option<DbReservation>> {
    inventory_reservations::table
        .filter(inventory_reservations::product_id.eq(key.product_id.as_str()))
        .filter(inventory_reservations::holder_id.eq(key.holder_id.as_str()))
        .filter(inventory_reservations::status.eq(ReservationStatus::Reserved.as_str()))
        .filter(inventory_reservations::expires_at.gt(now))
        .first::<DbReservation>(conn)
        .await
        .optional()
}

/// Ids of leases that ran out before `now` but still hold stock, grouped by
/// product so sweeps take product locks in a stable order.
pub async fn expired(conn: &mut AsyncPgConnection, now: DateTime<Utc>) -> QueryResult<Vec<(Uuid, String)>> {
    inventory_reservations::table
        .filter(inventory_reservations::status.eq(ReservationStatus::Reserved.as_str()))
        .filter(inventory_reservations::expires_at.lt(now))
        .order((inventory_reservations::product_id.asc(), inventory_reservations::id.asc()))
        .select((inventory_reservations::id, inventory_reservations::product_id))
        .load::<(Uuid, String)>(conn)
        .await
}

pub async fn count_held(conn: &mut AsyncPgConnection, product_id: &str) -> QueryResult<i64> {
    inventory_reservations::table
        .filter(inventory_reservations::product_id.eq(product_id))
        .filter(inventory_reservations::status.eq(ReservationStatus::Reserved.as_str()))
        .count()
        .get_result::<i64>(conn)
        .await
}

pub async fn insert(conn: &mut AsyncPgConnection, reservation: &Reservation) -> QueryResult<DbReservation> {
    diesel::insert_into(inventory_reservations::table)
        .values(DbReservation::from(reservation))
        .get_result::<DbReservation>(conn)
        .await
}

/// Writes the lifecycle fields of an existing row.
pub async fn save(conn: &mut AsyncPgConnection, reservation: &Reservation) -> QueryResult<DbReservation> {
    diesel::update(inventory_reservations::table.find(reservation.id))
        .set((
            inventory_reservations::quantity.eq(reservation.quantity),
            inventory_reservations::expires_at.eq(reservation.expires_at),
            inventory_reservations::status.eq(reservation.status.as_str()),
            inventory_reservations::updated_at.eq(reservation.updated_at),
        ))
        .get_result::<DbReservation>(conn)
        .await
}

pub async fn delete_for_product(conn: &mut AsyncPgConnection, product_id: &str) -> QueryResult<usize> {
    diesel::delete(inventory_reservations::table.filter(inventory_reservations::product_id.eq(product_id)))
        .execute(conn)
        .await
}
