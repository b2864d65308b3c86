//! Normalized API errors
//!
//! Every failed exchange made through [`crate::client::ApiClient`] is turned
//! into an [`ApiError`] here, so callers only ever see one error shape.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Message used when neither the server nor the transport supplied one.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred.";

// == Api Error ==
/// Uniform `{message, status, data}` failure returned to API callers.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description, never empty
    pub message: String,
    /// HTTP status when a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Raw server payload when one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiError {
    // == Normalize ==
    /// Builds the error from whatever the failed exchange produced.
    ///
    /// The message is the first non-empty candidate of: the server payload's
    /// `message` field, the transport message, [`DEFAULT_ERROR_MESSAGE`].
    pub fn normalize(data: Option<Value>, transport_message: Option<&str>, status: Option<u16>) -> Self {
        let server_message = data
            .as_ref()
            .and_then(|payload| payload.get("message"))
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty());

        let message = server_message
            .or(transport_message.filter(|msg| !msg.is_empty()))
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string();

        Self {
            message,
            status,
            data,
        }
    }

    /// Error for a response that arrived with a non-success status.
    pub fn from_status(status: StatusCode, data: Option<Value>) -> Self {
        let transport_message = format!("Request failed with status code {}", status.as_u16());
        Self::normalize(data, Some(&transport_message), Some(status.as_u16()))
    }

    /// Error for an exchange that failed in the transport layer.
    ///
    /// Covers unreachable hosts, timeouts, and undecodable bodies.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let transport_message = err.to_string();
        Self::normalize(
            None,
            Some(&transport_message),
            err.status().map(|s| s.as_u16()),
        )
    }

    /// True for HTTP 401 Unauthorized.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}
