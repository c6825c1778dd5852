//! Database schema management for `pettrack-ingest`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `imports` table (one row per ingestion attempt) and the
/// `readings` table (one row per accepted location fix). Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imports (
            id                  UUID        PRIMARY KEY,
            received_at         TIMESTAMPTZ NOT NULL,
            content_hash        TEXT        NOT NULL,
            raw_content         JSONB       NOT NULL,
            source              TEXT        NOT NULL,
            expected_item_count INTEGER     NOT NULL,
            status              TEXT        NOT NULL,
            error_message       TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // `timestamp` stays TEXT: unparseable device strings are stored verbatim.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id             UUID             PRIMARY KEY,
            pet_name       TEXT             NOT NULL,
            latitude       DOUBLE PRECISION NOT NULL,
            longitude      DOUBLE PRECISION NOT NULL,
            accuracy       DOUBLE PRECISION NOT NULL,
            timestamp      TEXT             NOT NULL,
            battery_status JSONB,
            is_inaccurate  BOOLEAN          NOT NULL DEFAULT FALSE,
            location_hash  TEXT             NOT NULL,
            import_id      UUID             NOT NULL REFERENCES imports (id)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Dedup keys
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_imports_content_hash
            ON imports (content_hash);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_readings_location_hash
            ON readings (location_hash);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_imports_received_at
            ON imports (received_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_imports_status
            ON imports (status);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_import_id
            ON readings (import_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_pet_name_timestamp
            ON readings (pet_name, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
