//! PostgreSQL implementation of [`Store`].
//!
//! Uniqueness of `content_hash` and `location_hash` is backed by unique
//! indexes (see `schema.rs`); inserts use `ON CONFLICT DO NOTHING` so a
//! concurrent loser observes a conflict instead of a second row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{InsertOutcome, Store, StoreError};
use crate::models::{Import, ImportStatus, NewImport, NewReading, Reading};

// ---

const IMPORT_COLUMNS: &str = "id, received_at, content_hash, raw_content, source, \
                              expected_item_count, status, error_message";

const READING_COLUMNS: &str = "id, pet_name, latitude, longitude, accuracy, timestamp, \
                               battery_status, is_inaccurate, location_hash, import_id";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ImportRow {
    // ---
    id: Uuid,
    received_at: DateTime<Utc>,
    content_hash: String,
    raw_content: Json<Value>,
    source: String,
    expected_item_count: i32,
    status: String,
    error_message: Option<String>,
}

impl TryFrom<ImportRow> for Import {
    type Error = StoreError;

    fn try_from(row: ImportRow) -> Result<Self, Self::Error> {
        // ---
        let status = row.status.parse().map_err(StoreError::InvalidRecord)?;
        Ok(Import {
            id: row.id,
            received_at: row.received_at,
            content_hash: row.content_hash,
            raw_content: row.raw_content.0,
            source: row.source,
            expected_item_count: row.expected_item_count,
            status,
            error_message: row.error_message,
        })
    }
}

fn to_import(row: Option<ImportRow>) -> Result<Option<Import>, StoreError> {
    row.map(Import::try_from).transpose()
}

#[async_trait]
impl Store for PgStore {
    // ---
    async fn find_import_by_hash(&self, content_hash: &str) -> Result<Option<Import>, StoreError> {
        // ---
        let row = sqlx::query_as::<_, ImportRow>(&format!(
            "SELECT {IMPORT_COLUMNS} FROM imports WHERE content_hash = $1 LIMIT 1"
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        to_import(row)
    }

    async fn get_import(&self, id: Uuid) -> Result<Option<Import>, StoreError> {
        // ---
        let row = sqlx::query_as::<_, ImportRow>(&format!(
            "SELECT {IMPORT_COLUMNS} FROM imports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        to_import(row)
    }

    async fn latest_import(&self) -> Result<Option<Import>, StoreError> {
        // ---
        let row = sqlx::query_as::<_, ImportRow>(&format!(
            "SELECT {IMPORT_COLUMNS} FROM imports ORDER BY received_at DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        to_import(row)
    }

    async fn pending_imports(&self) -> Result<Vec<Uuid>, StoreError> {
        // ---
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM imports WHERE status = $1 ORDER BY received_at ASC",
        )
        .bind(ImportStatus::Processing.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn create_import(&self, new: NewImport) -> Result<Import, StoreError> {
        // ---
        let row = sqlx::query_as::<_, ImportRow>(&format!(
            r#"
            INSERT INTO imports (
                id, received_at, content_hash, raw_content,
                source, expected_item_count, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (content_hash) DO NOTHING
            RETURNING {IMPORT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(&new.content_hash)
        .bind(Json(&new.raw_content))
        .bind(&new.source)
        .bind(new.expected_item_count)
        .bind(ImportStatus::Processing.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Import::try_from(row),
            None => Err(StoreError::Conflict("content_hash")),
        }
    }

    async fn finish_import(
        &self,
        id: Uuid,
        status: ImportStatus,
        error_message: Option<String>,
    ) -> Result<bool, StoreError> {
        // ---
        let result = sqlx::query(
            r#"
            UPDATE imports
               SET status = $2, error_message = $3
             WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(ImportStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_reading_by_hash(
        &self,
        location_hash: &str,
    ) -> Result<Option<Reading>, StoreError> {
        // ---
        let reading = sqlx::query_as::<_, Reading>(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE location_hash = $1 LIMIT 1"
        ))
        .bind(location_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn insert_reading(&self, new: NewReading) -> Result<InsertOutcome, StoreError> {
        // ---
        let reading = sqlx::query_as::<_, Reading>(&format!(
            r#"
            INSERT INTO readings (
                id, pet_name, latitude, longitude, accuracy, timestamp,
                battery_status, is_inaccurate, location_hash, import_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (location_hash) DO NOTHING
            RETURNING {READING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.pet_name)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.accuracy)
        .bind(&new.timestamp)
        .bind(new.battery_status.as_ref().map(Json))
        .bind(new.is_inaccurate)
        .bind(&new.location_hash)
        .bind(new.import_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match reading {
            Some(reading) => InsertOutcome::Inserted(reading),
            None => InsertOutcome::AlreadyPresent,
        })
    }
}
