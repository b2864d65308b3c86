//! Error types for the budget server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failures raised by the persistent token store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store was torn down or lost its connection
    #[error("store is disconnected")]
    Disconnected,

    /// A record with the same token already exists
    #[error("duplicate token: {0}")]
    Duplicate(String),

    /// Any other backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

// == Server Error Enum ==
/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Database health probe failed
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(#[from] StoreError),

    /// No route matched the request
    #[error("Route not found")]
    NotFound,
}

// == IntoResponse Implementation ==
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::DatabaseUnavailable(_) => {
                let body = Json(json!({
                    "status": "error",
                    "database": "disconnected",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }));
                (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
            }
            ServerError::NotFound => {
                let body = Json(ErrorResponse::new(self.to_string()));
                (StatusCode::NOT_FOUND, body).into_response()
            }
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
