//! Durable store boundary for imports and readings.
//!
//! Handlers and the processor only see the [`Store`] trait; the production
//! implementation is [`PgStore`]. Lookups report "not found" as `Ok(None)`
//! so callers can tell it apart from a failing store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Import, ImportStatus, NewImport, NewReading, Reading};

#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A record with the same unique key already exists.
    #[error("unique key conflict on {0}")]
    Conflict(&'static str),
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result of an insert-if-absent keyed on `location_hash`.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(Reading),
    AlreadyPresent,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ---
    async fn find_import_by_hash(&self, content_hash: &str) -> Result<Option<Import>, StoreError>;

    async fn get_import(&self, id: Uuid) -> Result<Option<Import>, StoreError>;

    /// Most recently received import.
    async fn latest_import(&self) -> Result<Option<Import>, StoreError>;

    /// Ids of imports still in `processing`, oldest first.
    async fn pending_imports(&self) -> Result<Vec<Uuid>, StoreError>;

    /// Create an import in `processing`. Fails with [`StoreError::Conflict`]
    /// when the content hash is already taken.
    async fn create_import(&self, new: NewImport) -> Result<Import, StoreError>;

    /// Move a `processing` import to its terminal status.
    ///
    /// Returns `false` if the import was not in `processing` (already
    /// terminal or missing); nothing is written in that case.
    async fn finish_import(
        &self,
        id: Uuid,
        status: ImportStatus,
        error_message: Option<String>,
    ) -> Result<bool, StoreError>;

    async fn find_reading_by_hash(&self, location_hash: &str)
        -> Result<Option<Reading>, StoreError>;

    /// Atomically insert unless a reading with the same `location_hash` exists.
    async fn insert_reading(&self, new: NewReading) -> Result<InsertOutcome, StoreError>;
}
