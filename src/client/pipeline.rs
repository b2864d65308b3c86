//! Request pipeline stages
//!
//! A [`Stage`] hooks into the three phases of an exchange: before the request
//! is sent, after a successful response, and after a normalized failure.
//! [`crate::client::ApiClient`] runs its stages in registration order.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, StatusCode, Url};
use tracing::{error, info};

use crate::client::error::ApiError;
use crate::client::storage::Session;

// == Response Meta ==
/// What a stage sees of a successful response.
///
/// The body has already been decoded for the caller by the time stages run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// HTTP status, always 2xx
    pub status: StatusCode,
    /// Final URL after redirects
    pub url: Url,
}

// == Stage ==
/// One step of the request pipeline. Every phase defaults to a no-op.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Inspects or rewrites an outgoing request.
    async fn on_request(&self, _request: &mut Request) {}

    /// Observes a successful, fully decoded response.
    async fn on_response(&self, _response: &ResponseMeta) {}

    /// Reacts to a failed exchange. The error reaching the caller is unchanged.
    async fn on_error(&self, _error: &ApiError, _url: &Url) {}
}

// == Request Logger ==
/// Logs every request, response and failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

#[async_trait]
impl Stage for RequestLogger {
    async fn on_request(&self, request: &mut Request) {
        info!("API Request: {} {}", request.method(), request.url());
    }

    async fn on_response(&self, response: &ResponseMeta) {
        info!("API Response: {} {}", response.status.as_u16(), response.url);
    }

    async fn on_error(&self, error: &ApiError, url: &Url) {
        error!(
            status = ?error.status,
            data = ?error.data,
            "API Error: {}: {}",
            url,
            error.message
        );
    }
}

// == Bearer Auth ==
/// Attaches `Authorization: Bearer <token>` from the stored session.
///
/// Best effort: a missing token or unreadable storage leaves the request
/// without the header and it is sent anyway.
#[derive(Clone)]
pub struct BearerAuth {
    session: Session,
}

impl BearerAuth {
    /// Reads tokens from `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Stage for BearerAuth {
    async fn on_request(&self, request: &mut Request) {
        let token = match self.session.token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return,
            Err(e) => {
                error!("Error reading auth token from storage: {}", e);
                return;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => error!("Stored auth token is not a valid header value: {}", e),
        }
    }
}

// == Session Reset ==
/// Clears the stored session when the server answers 401.
///
/// Does not navigate anywhere; the UI observes the cleared session and
/// decides whether to show the login screen.
#[derive(Clone)]
pub struct SessionReset {
    session: Session,
}

impl SessionReset {
    /// Clears `session` on authentication failures.
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Stage for SessionReset {
    async fn on_error(&self, error: &ApiError, _url: &Url) {
        if !error.is_unauthorized() {
            return;
        }
        if let Err(e) = self.session.clear().await {
            error!("Failed to clear auth storage: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{
        KeyValueStore, MemoryStorage, StorageError, AUTH_TOKEN_KEY, USER_DATA_KEY,
    };
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    /// Storage whose every operation fails.
    struct BrokenStorage;

    #[async_trait]
    impl KeyValueStore for BrokenStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("locked".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".to_string()))
        }

        async fn multi_remove(&self, _keys: &[&str]) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("locked".to_string()))
        }
    }

    fn request() -> Request {
        Request::new(
            Method::GET,
            Url::parse("http://localhost:3000/api/budget").unwrap(),
        )
    }

    fn url() -> Url {
        Url::parse("http://localhost:3000/api/budget").unwrap()
    }

    async fn signed_in_session() -> Session {
        let session = Session::new(Arc::new(MemoryStorage::new()));
        session
            .save("secret-token", &json!({ "id": "u1" }))
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_bearer_auth_attaches_token() {
        let stage = BearerAuth::new(signed_in_session().await);
        let mut req = request();

        stage.on_request(&mut req).await;

        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            "Bearer secret-token"
        );
    }

    #[tokio::test]
    async fn test_bearer_auth_without_token() {
        let stage = BearerAuth::new(Session::new(Arc::new(MemoryStorage::new())));
        let mut req = request();

        stage.on_request(&mut req).await;

        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_bearer_auth_swallows_storage_failure() {
        let stage = BearerAuth::new(Session::new(Arc::new(BrokenStorage)));
        let mut req = request();

        stage.on_request(&mut req).await;

        assert!(req.headers().get(AUTHORIZATION).is_none());
        assert_eq!(req.url().path(), "/api/budget");
    }

    #[tokio::test]
    async fn test_session_reset_on_unauthorized() {
        let session = signed_in_session().await;
        let stage = SessionReset::new(session.clone());
        let err = ApiError::normalize(None, Some("Unauthorized"), Some(401));

        stage.on_error(&err, &url()).await;

        let storage = session.storage();
        assert!(storage.get(AUTH_TOKEN_KEY).await.unwrap().is_none());
        assert!(storage.get(USER_DATA_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_reset_ignores_other_failures() {
        let session = signed_in_session().await;
        let stage = SessionReset::new(session.clone());

        for status in [Some(403), Some(500), None] {
            let err = ApiError::normalize(None, Some("failed"), status);
            stage.on_error(&err, &url()).await;
        }

        assert_eq!(session.token().await.unwrap().as_deref(), Some("secret-token"));
        assert!(session.user_data().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_session_reset_tolerates_storage_failure() {
        let stage = SessionReset::new(Session::new(Arc::new(BrokenStorage)));
        let err = ApiError::normalize(None, None, Some(401));

        // Must not panic
        stage.on_error(&err, &url()).await;
    }
}
