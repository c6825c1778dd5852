use std::sync::Arc;

use axum::{http::StatusCode, Router};
use tower_http::timeout::TimeoutLayer;

use crate::{Config, ImportQueue, Store};

mod health;
mod imports;
mod recv;

// ---

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: Arc<dyn Store>,
    pub queue: ImportQueue,
}

pub fn router(state: AppState, config: &Config) -> Router {
    // ---
    Router::new()
        .merge(recv::router(config.max_body_bytes))
        .merge(imports::router())
        .merge(health::router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .with_state(state)
}
