//! Response DTOs for the budget server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

/// Version reported by the health endpoint.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response body for the health endpoint (GET /api/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status, `"ok"` when healthy
    pub status: String,
    /// Database connectivity, `"connected"` when the ping succeeded
    pub database: String,
    /// API version
    pub version: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a healthy response with the current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            database: "connected".to_string(),
            version: API_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body carrying a human-readable message.
///
/// The `message` field is what API clients surface to the user.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
