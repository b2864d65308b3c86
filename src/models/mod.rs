//! Response models for the budget server API
//!
//! DTOs serialized into HTTP response bodies.

pub mod responses;

pub use responses::{ErrorResponse, HealthResponse};
