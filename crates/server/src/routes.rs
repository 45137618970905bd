//! HTTP routes for the page cache.
//!
//! Two endpoints, both keyed by page ID:
//!
//! - `GET /cache/{page_id}` — serve the cached page, populating on a miss.
//! - `POST /cache/{page_id}` — force refresh-and-mirror-and-store.
//!
//! Responses are the full record map as JSON. CORS is wide open: cached
//! pages are meant to be fetched straight from browsers.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use pagemirror_client::{CloudinaryHost, NotionClient, PageCacheReconciler};
use pagemirror_core::{CacheDb, Snapshot};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// The fully wired reconciler the server runs.
pub type Reconciler = PageCacheReconciler<NotionClient, CacheDb, CloudinaryHost>;

pub type AppState = Arc<Reconciler>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cache/{page_id}", get(get_page).post(put_page))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve a cached page, or fetch-mirror-store it on a miss.
async fn get_page(State(state): State<AppState>, Path(page_id): Path<String>) -> Result<Json<Snapshot>, ApiError> {
    tracing::info!(%page_id, "GET /cache");
    let snapshot = state.get(&page_id).await?;
    Ok(Json(snapshot))
}

/// Force a refresh: fetch from the origin, mirror images, store, return.
async fn put_page(State(state): State<AppState>, Path(page_id): Path<String>) -> Result<Json<Snapshot>, ApiError> {
    tracing::info!(%page_id, "POST /cache");
    let snapshot = state.put(&page_id).await?;
    Ok(Json(snapshot))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found.")
}
