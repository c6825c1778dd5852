//! `POST /recv`: batch ingestion with content-hash dedup.
//!
//! The server hashes the canonical form of `content` itself; the client's
//! `md5` is only echoed back as `hash_match`. A new import is stored in
//! `processing` and announced on the processor queue. Nothing is processed
//! inline, so `processed_locations` is always `0` in the response.
//!
//! The announcement never waits on queue capacity inside the request: when
//! the queue is full the event is handed to a background task.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::{
    fingerprint::{content_hash, looks_like_md5},
    models::{Import, NewImport},
    store::StoreError,
    ImportCreated, ImportError,
};

// ---

const DEFAULT_SOURCE: &str = "api";

pub fn router(max_body_bytes: usize) -> Router<AppState> {
    // ---
    Router::new()
        .route("/recv", post(handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

#[derive(Debug, Deserialize)]
struct RecvRequest {
    #[serde(default)]
    md5: String,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum RecvStatus {
    Ok,
    Duplicated,
}

#[derive(Debug, Serialize)]
struct RecvResponse {
    // ---
    status: RecvStatus,
    import_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    items_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imported_at: Option<String>,
    processed_locations: u32,
    computed_hash: String,
    /// `None` when the client md5 is not a 32-char hex string.
    hash_match: Option<bool>,
}

impl RecvResponse {
    // ---
    fn created(import: &Import, hash_match: Option<bool>) -> Self {
        // ---
        RecvResponse {
            status: RecvStatus::Ok,
            import_id: import.id,
            items_count: Some(import.expected_item_count),
            imported_at: None,
            processed_locations: 0,
            computed_hash: import.content_hash.clone(),
            hash_match,
        }
    }

    fn duplicated(existing: &Import, hash_match: Option<bool>) -> Self {
        // ---
        RecvResponse {
            status: RecvStatus::Duplicated,
            import_id: existing.id,
            items_count: None,
            imported_at: Some(
                existing
                    .received_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ),
            processed_locations: 0,
            computed_hash: existing.content_hash.clone(),
            hash_match,
        }
    }
}

/// Array length for array content, `1` for anything else.
fn expected_item_count(content: &Value) -> i32 {
    // ---
    content
        .as_array()
        .map_or(1, |items| i32::try_from(items.len()).unwrap_or(i32::MAX))
}

async fn handler(
    State(state): State<AppState>,
    body: Result<Json<RecvRequest>, JsonRejection>,
) -> Result<Json<RecvResponse>, ImportError> {
    // ---
    let Json(body) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ImportError::PayloadTooLarge(e.body_text())
        } else {
            ImportError::InvalidInput(e.body_text())
        }
    })?;

    let content = match body.content {
        Some(content) if !body.md5.is_empty() => content,
        _ => {
            return Err(ImportError::InvalidInput(
                "Missing required fields: md5 and content".to_string(),
            ))
        }
    };

    let computed = content_hash(&content)?;
    let hash_match = looks_like_md5(&body.md5).then(|| body.md5.eq_ignore_ascii_case(&computed));
    debug!(%computed, provided = %body.md5, ?hash_match, "POST /recv - hashed content");

    if let Some(existing) = state.store.find_import_by_hash(&computed).await? {
        info!(import_id = %existing.id, "POST /recv - duplicate content");
        return Ok(Json(RecvResponse::duplicated(&existing, hash_match)));
    }

    let source = body
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let new_import = NewImport {
        content_hash: computed.clone(),
        expected_item_count: expected_item_count(&content),
        raw_content: content,
        source,
    };

    let import = match state.store.create_import(new_import).await {
        Ok(import) => import,
        Err(StoreError::Conflict(_)) => {
            // A concurrent request stored the same content after our lookup.
            let existing = state
                .store
                .find_import_by_hash(&computed)
                .await?
                .ok_or(StoreError::Conflict("content_hash"))?;
            info!(import_id = %existing.id, "POST /recv - duplicate content (concurrent)");
            return Ok(Json(RecvResponse::duplicated(&existing, hash_match)));
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        import_id = %import.id,
        items = import.expected_item_count,
        source = %import.source,
        "POST /recv - import stored"
    );

    publish(&state, ImportCreated {
        import_id: import.id,
    });

    Ok(Json(RecvResponse::created(&import, hash_match)))
}

/// Announce a committed import without waiting on the worker.
fn publish(state: &AppState, event: ImportCreated) {
    // ---
    match state.queue.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(import_id = %event.import_id, "Import queue full, publishing in the background");
            let queue = state.queue.clone();
            tokio::spawn(async move {
                if queue.send(event).await.is_err() {
                    error!(import_id = %event.import_id, "Import queue closed, processing deferred");
                }
            });
        }
        // The import stays `processing` and is requeued on the next startup.
        Err(TrySendError::Closed(event)) => {
            error!(import_id = %event.import_id, "Import queue closed, processing deferred");
        }
    }
}
