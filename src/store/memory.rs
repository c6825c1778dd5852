//! In-process [`Store`] used by unit and router tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{InsertOutcome, Store, StoreError};
use crate::models::{Import, ImportStatus, NewImport, NewReading, Reading};

// ---

#[derive(Default)]
struct Tables {
    imports: Vec<Import>,
    readings: Vec<Reading>,
}

/// Mirrors the Postgres semantics (unique hashes, guarded status update).
///
/// Tests can make individual operations fail, slow down import lookups, or
/// make the next lookup miss a row that exists. A missed lookup is what a
/// request sees when a concurrent writer commits between its lookup and
/// its insert.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_import_lookups: AtomicBool,
    fail_import_creates: AtomicBool,
    fail_finish: AtomicBool,
    fail_reading_lookups: AtomicBool,
    fail_reading_inserts: AtomicBool,
    hide_next_import_lookup: AtomicBool,
    hide_next_reading_lookup: AtomicBool,
    import_lookup_delay_ms: AtomicU64,
}

fn injected() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("injected failure".to_string()))
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock poisoned")
    }

    pub fn set_fail_import_lookups(&self, fail: bool) {
        self.fail_import_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_import_creates(&self, fail: bool) {
        self.fail_import_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_finish(&self, fail: bool) {
        self.fail_finish.store(fail, Ordering::SeqCst);
    }

    /// The next `find_import_by_hash` returns `None` even if the row exists.
    pub fn hide_next_import_lookup(&self) {
        self.hide_next_import_lookup.store(true, Ordering::SeqCst);
    }

    /// The next `find_reading_by_hash` returns `None` even if the row exists.
    pub fn hide_next_reading_lookup(&self) {
        self.hide_next_reading_lookup.store(true, Ordering::SeqCst);
    }

    pub fn set_import_lookup_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.import_lookup_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn set_fail_reading_lookups(&self, fail: bool) {
        self.fail_reading_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reading_inserts(&self, fail: bool) {
        self.fail_reading_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn imports(&self) -> Vec<Import> {
        self.tables().imports.clone()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.tables().readings.clone()
    }

    /// Seed a reading directly, bypassing an import run.
    pub fn seed_reading(&self, new: NewReading) {
        self.tables().readings.push(new.into_reading(Uuid::new_v4()));
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ---
    async fn find_import_by_hash(&self, content_hash: &str) -> Result<Option<Import>, StoreError> {
        // ---
        let delay = self.import_lookup_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_import_lookups.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if self.hide_next_import_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .tables()
            .imports
            .iter()
            .find(|i| i.content_hash == content_hash)
            .cloned())
    }

    async fn get_import(&self, id: Uuid) -> Result<Option<Import>, StoreError> {
        Ok(self.tables().imports.iter().find(|i| i.id == id).cloned())
    }

    async fn latest_import(&self) -> Result<Option<Import>, StoreError> {
        // ---
        Ok(self
            .tables()
            .imports
            .iter()
            .max_by_key(|i| i.received_at)
            .cloned())
    }

    async fn pending_imports(&self) -> Result<Vec<Uuid>, StoreError> {
        // ---
        Ok(self
            .tables()
            .imports
            .iter()
            .filter(|i| i.status == ImportStatus::Processing)
            .map(|i| i.id)
            .collect())
    }

    async fn create_import(&self, new: NewImport) -> Result<Import, StoreError> {
        // ---
        if self.fail_import_creates.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        if tables.imports.iter().any(|i| i.content_hash == new.content_hash) {
            return Err(StoreError::Conflict("content_hash"));
        }
        let import = Import {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            content_hash: new.content_hash,
            raw_content: new.raw_content,
            source: new.source,
            expected_item_count: new.expected_item_count,
            status: ImportStatus::Processing,
            error_message: None,
        };
        tables.imports.push(import.clone());
        Ok(import)
    }

    async fn finish_import(
        &self,
        id: Uuid,
        status: ImportStatus,
        error_message: Option<String>,
    ) -> Result<bool, StoreError> {
        // ---
        if self.fail_finish.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        match tables
            .imports
            .iter_mut()
            .find(|i| i.id == id && i.status == ImportStatus::Processing)
        {
            Some(import) => {
                import.status = status;
                import.error_message = error_message;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_reading_by_hash(
        &self,
        location_hash: &str,
    ) -> Result<Option<Reading>, StoreError> {
        // ---
        if self.fail_reading_lookups.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if self.hide_next_reading_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .tables()
            .readings
            .iter()
            .find(|r| r.location_hash == location_hash)
            .cloned())
    }

    async fn insert_reading(&self, new: NewReading) -> Result<InsertOutcome, StoreError> {
        // ---
        if self.fail_reading_inserts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        if tables
            .readings
            .iter()
            .any(|r| r.location_hash == new.location_hash)
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let reading = new.into_reading(Uuid::new_v4());
        tables.readings.push(reading.clone());
        Ok(InsertOutcome::Inserted(reading))
    }
}
