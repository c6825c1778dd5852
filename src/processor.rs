//! Import processing: turns a stored import into readings and settles its status.
//!
//! The ingestion endpoint publishes an [`ImportCreated`] event after the
//! import row is committed; [`run_worker`] consumes those events one at a
//! time and hands each to [`ImportProcessor::process`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    coerce,
    decode::{decode_items, RawContent},
    fingerprint::location_hash,
    models::{Import, ImportStatus, NewReading, RawLocation},
    store::{InsertOutcome, Store},
    validate::{extract_tag_id, has_valid_coordinates, is_valid_tag},
    ImportError,
};

// ---

/// Published once per committed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportCreated {
    pub import_id: Uuid,
}

pub type ImportQueue = mpsc::Sender<ImportCreated>;

/// Per-import counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub processed: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The import was already terminal; nothing was done.
    Skipped(ImportStatus),
    Finished { status: ImportStatus, tally: Tally },
}

/// Terminal status for a finished run, checked in priority order.
pub fn classify(tally: Tally, expected: usize) -> ImportStatus {
    // ---
    let Tally {
        processed,
        duplicates,
        errors,
    } = tally;

    if processed == expected && duplicates == 0 && errors == 0 {
        ImportStatus::Full
    } else if processed == 0 && duplicates > 0 && errors == 0 {
        ImportStatus::Duplicate
    } else if processed > 0 {
        ImportStatus::Partial
    } else {
        ImportStatus::Error
    }
}

#[derive(Clone)]
pub struct ImportProcessor {
    store: Arc<dyn Store>,
}

/// What happened to a single decoded item.
enum ItemResult {
    Stored,
    Duplicate,
    Failed,
    Skipped(&'static str),
}

impl ImportProcessor {
    // ---
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Process one import to completion.
    ///
    /// Per-item failures are counted, never propagated. An `Err` means the
    /// import itself could not be loaded or its final status not written.
    pub async fn process(&self, import_id: Uuid) -> Result<ProcessOutcome, ImportError> {
        // ---
        let import = self
            .store
            .get_import(import_id)
            .await?
            .ok_or(ImportError::NotFound)?;

        if import.status.is_terminal() {
            debug!(%import_id, status = %import.status, "Import already settled, skipping");
            return Ok(ProcessOutcome::Skipped(import.status));
        }

        info!(
            %import_id,
            source = %import.source,
            content_hash = %import.content_hash,
            expected = import.expected_item_count,
            "Processing import"
        );

        let items = match decode_items(RawContent::Parsed(import.raw_content.clone())) {
            Ok(items) => items,
            Err(e) => {
                warn!(%import_id, "Import content unusable: {}", e);
                self.finish(import_id, ImportStatus::Error, Some(e.to_string()))
                    .await?;
                return Ok(ProcessOutcome::Finished {
                    status: ImportStatus::Error,
                    tally: Tally::default(),
                });
            }
        };

        let mut tally = Tally::default();
        for (index, item) in items.iter().enumerate() {
            match self.process_item(&import, item).await {
                ItemResult::Stored => tally.processed += 1,
                ItemResult::Duplicate => tally.duplicates += 1,
                ItemResult::Failed => tally.errors += 1,
                ItemResult::Skipped(reason) => {
                    debug!(%import_id, index, "Skipping item: {}", reason);
                }
            }
        }

        let expected = match usize::try_from(import.expected_item_count) {
            Ok(0) | Err(_) => items.len(),
            Ok(n) => n,
        };
        let status = classify(tally, expected);
        let error_message = (status == ImportStatus::Error).then(|| {
            format!(
                "no readings stored from {} items ({} duplicates, {} errors)",
                items.len(),
                tally.duplicates,
                tally.errors
            )
        });

        self.finish(import_id, status, error_message).await?;

        info!(
            %import_id,
            processed = tally.processed,
            duplicates = tally.duplicates,
            errors = tally.errors,
            %status,
            "Import processed"
        );

        Ok(ProcessOutcome::Finished { status, tally })
    }

    async fn process_item(&self, import: &Import, item: &Value) -> ItemResult {
        // ---
        let Some(name) = item.get("name").and_then(coerce::as_str) else {
            return ItemResult::Skipped("missing name");
        };
        if !is_valid_tag(name) {
            return ItemResult::Skipped("not a device tag");
        }
        let Some(loc) = item.get("location").and_then(RawLocation::from_value) else {
            return ItemResult::Skipped("missing location");
        };
        if !has_valid_coordinates(&loc) {
            return ItemResult::Skipped("invalid coordinates");
        }
        let Some((latitude, longitude)) = loc.coordinates() else {
            return ItemResult::Skipped("invalid coordinates");
        };

        let hash = location_hash(name, latitude, longitude, loc.horizontal_accuracy);
        let tag_id = extract_tag_id(name).unwrap_or_default();

        match self.store.find_reading_by_hash(&hash).await {
            Ok(Some(_)) => return ItemResult::Duplicate,
            Ok(None) => {}
            Err(e) => {
                error!(import_id = %import.id, tag_id, "Reading lookup failed: {}", e);
                return ItemResult::Failed;
            }
        }

        let reading = NewReading {
            pet_name: name.to_string(),
            latitude,
            longitude,
            accuracy: loc.horizontal_accuracy,
            timestamp: coerce::to_iso(loc.time_stamp.as_ref()),
            battery_status: battery_status(item),
            is_inaccurate: loc.is_inaccurate,
            location_hash: hash,
            import_id: import.id,
        };

        match self.store.insert_reading(reading).await {
            Ok(InsertOutcome::Inserted(reading)) => {
                debug!(import_id = %import.id, reading_id = %reading.id, tag_id, "Reading stored");
                ItemResult::Stored
            }
            // Another import stored the same fix between our lookup and insert.
            Ok(InsertOutcome::AlreadyPresent) => ItemResult::Duplicate,
            Err(e) => {
                error!(import_id = %import.id, tag_id, "Failed to store reading: {}", e);
                ItemResult::Failed
            }
        }
    }

    async fn finish(
        &self,
        import_id: Uuid,
        status: ImportStatus,
        error_message: Option<String>,
    ) -> Result<(), ImportError> {
        // ---
        match self
            .store
            .finish_import(import_id, status, error_message)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(%import_id, %status, "Import settled concurrently, status not written");
                Ok(())
            }
            Err(e) => {
                error!(%import_id, %status, "Failed to save import status: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Battery status is passed through as sent, item level first.
fn battery_status(item: &Value) -> Option<Value> {
    // ---
    item.get("batteryStatus")
        .or_else(|| item.get("location").and_then(|loc| loc.get("batteryStatus")))
        .filter(|v| !v.is_null())
        .cloned()
}

/// Consume import events until every sender is dropped.
pub async fn run_worker(processor: ImportProcessor, mut events: mpsc::Receiver<ImportCreated>) {
    // ---
    info!("Import processor worker started");
    while let Some(ImportCreated { import_id }) = events.recv().await {
        if let Err(e) = processor.process(import_id).await {
            error!(%import_id, "Import processing failed: {}", e);
        }
    }
    info!("Import queue closed, processor worker exiting");
}

/// Enqueue every import left in `processing`, e.g. after a restart.
pub async fn requeue_pending(store: &dyn Store, queue: &ImportQueue) -> Result<usize, ImportError> {
    // ---
    let pending = store.pending_imports().await?;
    let count = pending.len();
    for import_id in pending {
        if queue.send(ImportCreated { import_id }).await.is_err() {
            warn!(%import_id, "Import queue closed while requeueing");
            break;
        }
    }
    Ok(count)
}
