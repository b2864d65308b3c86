//! Budget API - backend and client plumbing for a personal budgeting app
//!
//! The server keeps password reset tokens in check with a background cleanup
//! job; the client module wraps HTTP calls with credential handling and
//! uniform error reporting.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod shutdown;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use client::{ApiClient, ApiError};
pub use config::{ClientConfig, ServerConfig};
pub use tasks::CleanupScheduler;
