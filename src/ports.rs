//! Storage ports. Adapters in `crate::adapters` implement these against
//! Postgres or process memory.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewTransaction, ProviderCredential, Transaction};

/// The unique column an insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    TransactionCode,
    SerialNumber,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate value for unique field {0:?}")]
    Conflict(UniqueField),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stored record is inconsistent: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("serial") => UniqueField::SerialNumber,
                    _ => UniqueField::TransactionCode,
                };
                return StoreError::Conflict(field);
            }
        }

        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only collection of transactions. Implementations must enforce
/// uniqueness of `transaction_code` and `serial_number` themselves and report
/// a collision as [`StoreError::Conflict`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists `tx`, assigning `created_at`.
    async fn insert(&self, tx: &NewTransaction) -> StoreResult<Transaction>;

    async fn code_exists(&self, code: &str) -> StoreResult<bool>;

    /// `code` is matched exactly; callers normalise case.
    async fn find_by_code(&self, code: &str) -> StoreResult<Transaction>;

    /// `serial` is matched exactly; callers normalise case.
    async fn find_by_serial(&self, serial: &str) -> StoreResult<Transaction>;

    /// Case-insensitive substring search over product name, admin name,
    /// buyer number, transaction code and serial number. Newest first.
    async fn search(&self, query: &str) -> StoreResult<Vec<Transaction>>;

    /// Every record, ordered by `created_at` (ties by code ascending).
    async fn list_all(&self, newest_first: bool) -> StoreResult<Vec<Transaction>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Read-only view over the externally administered render providers.
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Ascending priority, ties broken by name.
    async fn list_by_priority(&self) -> StoreResult<Vec<ProviderCredential>>;
}
