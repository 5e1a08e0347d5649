//! HTTP transport for resumable big-file uploads.
//!
//! Exposes the store over three `POST` routes: [`CHECK_PATH`],
//! [`UPLOAD_PATH`] and [`MERGE_PATH`]. Every response is a
//! [`JsonResult`](bigfile_protocol::JsonResult) envelope.

mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use bigfile_protocol::constants::{CHECK_PATH, MERGE_PATH, UPLOAD_PATH};
use bigfile_store::BigFileStore;

pub use error::ApiError;

/// Room for multipart boundaries and the small text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store: Arc<BigFileStore>,
}

impl AppState {
    pub fn new(store: Arc<BigFileStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &BigFileStore {
        &self.store
    }
}

/// Builds the router. Request bodies are capped at `max_chunk_bytes`
/// plus multipart framing.
pub fn router(state: AppState, max_chunk_bytes: usize) -> Router {
    Router::new()
        .route(CHECK_PATH, post(handlers::check))
        .route(UPLOAD_PATH, post(handlers::upload))
        .route(MERGE_PATH, post(handlers::merge))
        .layer(DefaultBodyLimit::max(
            max_chunk_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(state)
}
