//! Reservation lifecycle.
//!
//! A reservation starts as `reserved` and moves once to a terminal state:
//! `committed` when the held units are deducted from stock, `released` when
//! the hold is returned (by the holder, or by the sweep after the lease runs
//! out). Counter adjustments floor at zero; the reservation row is the record
//! of what was held, so a product edited by hand never goes negative.
//!
//! Both store backends drive their writes through the functions here, so the
//! rules live in one place and the backends only decide how to make each
//! transition atomic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a reservation lease, counted from creation or renewal.
pub const LEASE_DURATION_MINUTES: i64 = 15;

pub fn lease_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(LEASE_DURATION_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Released,
    Committed,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Released => "released",
            ReservationStatus::Committed => "committed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationStatus::Reserved)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ReservationStatus::Reserved),
            "released" => Ok(ReservationStatus::Released),
            "committed" => Ok(ReservationStatus::Committed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The two counters a product carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
    pub stock: i32,
    pub reserved_stock: i32,
}

impl StockLevels {
    pub fn new(stock: i32, reserved_stock: i32) -> Self {
        Self { stock, reserved_stock }
    }

    /// Units that can still be reserved. Never negative.
    pub fn available(self) -> i32 {
        self.stock.saturating_sub(self.reserved_stock).max(0)
    }

    pub fn is_consistent(self) -> bool {
        0 <= self.reserved_stock && self.reserved_stock <= self.stock
    }

    /// Holds `quantity` more units, or `None` when the available capacity
    /// does not cover the whole request.
    pub fn reserve(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 || self.available() < quantity {
            return None;
        }
        Some(Self {
            stock: self.stock,
            reserved_stock: self.reserved_stock + quantity,
        })
    }

    pub fn release(self, quantity: i32) -> Self {
        Self {
            stock: self.stock,
            reserved_stock: floor_sub(self.reserved_stock, quantity),
        }
    }

    /// Removes the units from stock and drops the hold in one step.
    pub fn commit(self, quantity: i32) -> Self {
        Self {
            stock: floor_sub(self.stock, quantity),
            reserved_stock: floor_sub(self.reserved_stock, quantity),
        }
    }
}

fn floor_sub(value: i32, amount: i32) -> i32 {
    value.saturating_sub(amount).max(0)
}

/// A move out of the `reserved` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Holder gives the units back while the lease is valid.
    Release,
    /// Holder takes the units while the lease is valid.
    Commit,
    /// Sweep returns the units of a lapsed lease.
    Expire,
}

impl Transition {
    pub fn target(self) -> ReservationStatus {
        match self {
            Transition::Release | Transition::Expire => ReservationStatus::Released,
            Transition::Commit => ReservationStatus::Committed,
        }
    }

    /// Counter effect of this transition for a hold of `quantity` units.
    pub fn apply_to(self, levels: StockLevels, quantity: i32) -> StockLevels {
        match self {
            Transition::Release | Transition::Expire => levels.release(quantity),
            Transition::Commit => levels.commit(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub product_id: String,
    pub holder_id: String,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(product_id: String, holder_id: String, quantity: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            holder_id,
            quantity,
            expires_at: lease_expiry(now),
            status: ReservationStatus::Reserved,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the record for a fresh lease, whatever state it was in.
    pub fn renew(&mut self, quantity: i32, now: DateTime<Utc>) {
        self.quantity = quantity;
        self.status = ReservationStatus::Reserved;
        self.expires_at = lease_expiry(now);
        self.updated_at = now;
    }

    /// Reserved and inside its lease.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at > now
    }

    /// Reserved but past its lease, waiting for the sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at < now
    }

    pub fn permits(&self, transition: Transition, now: DateTime<Utc>) -> bool {
        match transition {
            Transition::Release => self.is_active(now),
            Transition::Commit => self.is_active(now) && self.quantity > 0,
            Transition::Expire => self.is_expired(now),
        }
    }

    /// Moves this reservation through `transition` and returns the owning
    /// product's new counters. `None` leaves both untouched.
    pub fn apply(
        &mut self,
        transition: Transition,
        levels: StockLevels,
        now: DateTime<Utc>,
    ) -> Option<StockLevels> {
        if !self.permits(transition, now) {
            return None;
        }
        self.status = transition.target();
        self.updated_at = now;
        Some(transition.apply_to(levels, self.quantity))
    }
}
