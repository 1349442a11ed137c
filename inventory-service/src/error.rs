use std::time::Duration;

use diesel_async::pooled_connection::PoolError;
use shared::ErrorKind;

pub type Result<T, E = InventoryError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(String),

    #[error("product {0} not found")]
    ProductNotFound(String),

    #[error("product {0} already exists")]
    ProductExists(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i32,
        available: i32,
    },

    #[error("no active reservation for holder {holder_id} on product {product_id}")]
    NoActiveReservation {
        product_id: String,
        holder_id: String,
    },

    #[error("holder {holder_id} has no reservation on product {product_id}")]
    ReservationNotFound {
        product_id: String,
        holder_id: String,
    },

    #[error("product {0} has active reservations")]
    ActiveReservations(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("timed out waiting for a database connection")]
    PoolTimeout,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl InventoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        InventoryError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Validation(_) => ErrorKind::Validation,
            InventoryError::ProductNotFound(_) | InventoryError::ReservationNotFound { .. } => ErrorKind::NotFound,
            InventoryError::ProductExists(_)
            | InventoryError::InsufficientStock { .. }
            | InventoryError::NoActiveReservation { .. }
            | InventoryError::ActiveReservations(_) => ErrorKind::Conflict,
            InventoryError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<diesel::result::Error> for InventoryError {
    fn from(err: diesel::result::Error) -> Self {
        InventoryError::Storage(StorageError::Database(err))
    }
}

impl From<bb8::RunError<PoolError>> for StorageError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        match err {
            bb8::RunError::User(e) => StorageError::Pool(e.to_string()),
            bb8::RunError::TimedOut => StorageError::PoolTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_caller_correctable() {
        let err = InventoryError::InsufficientStock {
            product_id: "P1".into(),
            requested: 7,
            available: 6,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.to_string(),
            "insufficient stock for product P1: requested 7, available 6"
        );
    }

    #[test]
    fn missing_reservation_is_not_found() {
        let err = InventoryError::ReservationNotFound {
            product_id: "P1".into(),
            holder_id: "u1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn storage_failures_are_internal() {
        let err: InventoryError = diesel::result::Error::RollbackTransaction.into();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: InventoryError = StorageError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
