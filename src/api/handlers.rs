//! API Handlers
//!
//! HTTP request handlers for the budget server endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::error;

use crate::error::ServerError;
use crate::models::HealthResponse;
use crate::store::{MemoryTokenStore, ResetTokenStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistent store for password reset tokens
    pub tokens: Arc<dyn ResetTokenStore>,
}

impl AppState {
    /// Creates a new AppState over the given token store.
    pub fn new(tokens: Arc<dyn ResetTokenStore>) -> Self {
        Self { tokens }
    }

    /// Creates a new AppState backed by a fresh in-process token store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }
}

/// Handler for GET /api/health
///
/// Pings the database and reports connectivity; 503 when the ping fails.
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ServerError> {
    if let Err(e) = state.tokens.ping().await {
        error!("API health check failed: {}", e);
        return Err(e.into());
    }

    Ok(Json(HealthResponse::healthy()))
}

/// Fallback for unmatched routes.
pub async fn not_found_handler() -> ServerError {
    ServerError::NotFound
}
