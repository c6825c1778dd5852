//! Read-only views of import records: `GET /imports/latest`, `GET /imports/{id}`.

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::AppState;
use crate::{Import, ImportError};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/imports/latest", get(latest))
        .route("/imports/{id}", get(by_id))
}

async fn latest(State(state): State<AppState>) -> Result<Json<Import>, ImportError> {
    // ---
    let import = state
        .store
        .latest_import()
        .await?
        .ok_or(ImportError::NotFound)?;
    Ok(Json(import))
}

async fn by_id(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Import>, ImportError> {
    // ---
    let Path(id) = id.map_err(|e| ImportError::InvalidInput(e.body_text()))?;
    let import = state
        .store
        .get_import(id)
        .await?
        .ok_or(ImportError::NotFound)?;
    Ok(Json(import))
}
