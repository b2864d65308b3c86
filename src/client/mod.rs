//! Client Module
//!
//! HTTP client used by front-ends to call the budget API.
//!
//! Each exchange passes through an ordered list of pipeline stages: the
//! stored bearer token is attached to outgoing requests, traffic is logged,
//! and a 401 clears the stored session. Failures always come back as an
//! [`ApiError`].

mod api_client;
mod error;
mod pipeline;
mod storage;

pub use api_client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, DEFAULT_ERROR_MESSAGE};
pub use pipeline::{BearerAuth, RequestLogger, ResponseMeta, SessionReset, Stage};
pub use storage::{
    FileStorage, KeyValueStore, MemoryStorage, Session, StorageError, AUTH_TOKEN_KEY,
    USER_DATA_KEY,
};
