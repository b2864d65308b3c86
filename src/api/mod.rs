//! API Module
//!
//! HTTP handlers and routing for the budget server REST API.
//!
//! # Endpoints
//! - `GET /api/health` - Health check including database connectivity

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, SECURITY_HEADERS};
