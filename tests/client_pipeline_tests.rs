//! Integration Tests for the API client pipeline
//!
//! Runs the client against a local axum server that echoes headers and
//! produces the failure shapes the pipeline has to normalize.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use budget_api::client::{
    ApiClient, ApiError, KeyValueStore, MemoryStorage, ResponseMeta, Session, Stage, StorageError,
    AUTH_TOKEN_KEY, DEFAULT_ERROR_MESSAGE, USER_DATA_KEY,
};
use budget_api::config::ClientConfig;
use reqwest::{Request, Url};
use serde_json::{json, Value};
use tokio::sync::Mutex;

// == Test Server ==

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "authorization": header("authorization"),
        "contentType": header("content-type"),
    }))
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "received": body }))
}

async fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Token expired" })),
    )
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Budget not found", "code": "E404" })),
    )
}

async fn bare_error() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn text_error() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream exploded")
}

async fn saved() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn created_empty() -> StatusCode {
    StatusCode::CREATED
}

async fn plain_text() -> &'static str {
    "all good"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(10)).await;
    Json(json!({ "late": true }))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/echo", get(echo_headers).post(echo_body))
        .route("/api/unauthorized", get(unauthorized))
        .route("/api/missing", get(not_found))
        .route("/api/bare", get(bare_error))
        .route("/api/text", get(text_error))
        .route("/api/slow", get(slow))
        .route("/api/saved", post(saved).delete(saved))
        .route("/api/created", post(created_empty))
        .route("/api/plain", get(plain_text));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn signed_in(addr: SocketAddr) -> (ApiClient, Session) {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
    let session = Session::new(storage.clone());
    session
        .save("stored-token", &json!({ "id": "u1", "username": "sam" }))
        .await
        .unwrap();
    let client = ApiClient::with_session(ClientConfig::new(format!("http://{}", addr)), storage)
        .unwrap();
    (client, session)
}

/// Storage whose reads and writes always fail.
struct LockedStorage;

#[async_trait]
impl KeyValueStore for LockedStorage {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("keychain locked".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("keychain locked".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("keychain locked".to_string()))
    }

    async fn multi_remove(&self, _keys: &[&str]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("keychain locked".to_string()))
    }
}

// == Request Phase ==

#[tokio::test]
async fn test_stored_token_is_sent_as_bearer() {
    let addr = spawn_server().await;
    let (client, _session) = signed_in(addr).await;

    let echoed: Value = client.get("/api/echo").await.unwrap();

    assert_eq!(echoed["authorization"], "Bearer stored-token");
    assert_eq!(echoed["contentType"], "application/json");
}

#[tokio::test]
async fn test_no_token_means_no_header() {
    let addr = spawn_server().await;
    let client = ApiClient::with_session(
        ClientConfig::new(format!("http://{}", addr)),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    let echoed: Value = client.get("/api/echo").await.unwrap();

    assert_eq!(echoed["authorization"], Value::Null);
}

#[tokio::test]
async fn test_storage_failure_still_sends_request() {
    let addr = spawn_server().await;
    let client = ApiClient::with_session(
        ClientConfig::new(format!("http://{}", addr)),
        Arc::new(LockedStorage),
    )
    .unwrap();

    let echoed: Value = client.get("/api/echo").await.unwrap();

    assert_eq!(echoed["authorization"], Value::Null);
}

#[tokio::test]
async fn test_post_json_body() {
    let addr = spawn_server().await;
    let (client, _session) = signed_in(addr).await;

    let echoed: Value = client
        .post("/api/echo", &json!({ "amount": 12.5, "name": "Coffee" }))
        .await
        .unwrap();

    assert_eq!(echoed["received"]["name"], "Coffee");
}

// == Failure Phase ==

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let addr = spawn_server().await;
    let (client, session) = signed_in(addr).await;

    let err = client.get::<Value>("/api/unauthorized").await.unwrap_err();

    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "Token expired");
    let storage = session.storage();
    assert!(storage.get(AUTH_TOKEN_KEY).await.unwrap().is_none());
    assert!(storage.get(USER_DATA_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unauthorized_with_broken_storage_still_rejects() {
    let addr = spawn_server().await;
    let client = ApiClient::with_session(
        ClientConfig::new(format!("http://{}", addr)),
        Arc::new(LockedStorage),
    )
    .unwrap();

    let err = client.get::<Value>("/api/unauthorized").await.unwrap_err();

    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "Token expired");
}

#[tokio::test]
async fn test_other_failures_keep_session() {
    let addr = spawn_server().await;
    let (client, session) = signed_in(addr).await;

    let err = client.get::<Value>("/api/missing").await.unwrap_err();

    assert_eq!(
        err,
        ApiError {
            message: "Budget not found".to_string(),
            status: Some(404),
            data: Some(json!({ "message": "Budget not found", "code": "E404" })),
        }
    );
    assert_eq!(session.token().await.unwrap().as_deref(), Some("stored-token"));
    assert!(session.user_data().await.unwrap().is_some());
}

#[tokio::test]
async fn test_status_without_body_uses_transport_message() {
    let addr = spawn_server().await;
    let (client, _session) = signed_in(addr).await;

    let err = client.get::<Value>("/api/bare").await.unwrap_err();

    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "Request failed with status code 500");
    assert!(err.data.is_none());
}

#[tokio::test]
async fn test_text_body_is_kept_as_data() {
    let addr = spawn_server().await;
    let (client, _session) = signed_in(addr).await;

    let err = client.get::<Value>("/api/text").await.unwrap_err();

    assert_eq!(err.status, Some(502));
    assert_eq!(err.data, Some(json!("upstream exploded")));
    assert_eq!(err.message, "Request failed with status code 502");
}

#[tokio::test]
async fn test_unreachable_server_is_normalized() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, session) = signed_in(addr).await;
    let err = client.get::<Value>("/api/echo").await.unwrap_err();

    assert!(err.status.is_none());
    assert!(err.data.is_none());
    assert!(!err.message.is_empty());
    assert_ne!(err.message, DEFAULT_ERROR_MESSAGE);
    assert!(session.token().await.unwrap().is_some());
}

#[tokio::test]
async fn test_timeout_is_normalized() {
    let addr = spawn_server().await;
    let storage = Arc::new(MemoryStorage::new());
    let mut config = ClientConfig::new(format!("http://{}", addr));
    config.timeout = Duration::from_millis(100);
    let client = ApiClient::with_session(config, storage).unwrap();

    let err = client.get::<Value>("/api/slow").await.unwrap_err();

    assert!(err.status.is_none());
    assert!(!err.message.is_empty());
}

// == Stage Ordering ==

/// Records which phases ran, tagged with the stage name.
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Stage for Recorder {
    async fn on_request(&self, _request: &mut Request) {
        self.log.lock().await.push(format!("{}:request", self.name));
    }

    async fn on_response(&self, response: &ResponseMeta) {
        self.log
            .lock()
            .await
            .push(format!("{}:response:{}", self.name, response.status.as_u16()));
    }

    async fn on_error(&self, error: &ApiError, _url: &Url) {
        self.log
            .lock()
            .await
            .push(format!("{}:error:{}", self.name, error.status.unwrap_or(0)));
    }
}

#[tokio::test]
async fn test_stages_run_in_registration_order() {
    let addr = spawn_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = ApiClient::builder(ClientConfig::new(format!("http://{}", addr)))
        .stage(Recorder {
            name: "first",
            log: log.clone(),
        })
        .stage(Recorder {
            name: "second",
            log: log.clone(),
        })
        .build()
        .unwrap();

    client.get::<Value>("/api/echo").await.unwrap();
    client.get::<Value>("/api/missing").await.unwrap_err();

    assert_eq!(
        *log.lock().await,
        vec![
            "first:request",
            "second:request",
            "first:response:200",
            "second:response:200",
            "first:request",
            "second:request",
            "first:error:404",
            "second:error:404",
        ]
    );
}

fn recording_client(addr: SocketAddr, log: &Arc<Mutex<Vec<String>>>) -> ApiClient {
    ApiClient::builder(ClientConfig::new(format!("http://{}", addr)))
        .stage(Recorder {
            name: "rec",
            log: log.clone(),
        })
        .build()
        .unwrap()
}

// == Success Bodies ==

#[tokio::test]
async fn test_no_content_decodes_as_unit_or_null() {
    let addr = spawn_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(addr, &log);

    let _: () = client.post("/api/saved", &json!({ "name": "Rent" })).await.unwrap();
    let value: Value = client.post("/api/saved", &json!({ "name": "Rent" })).await.unwrap();
    assert_eq!(value, Value::Null);
    let created: Option<Value> = client.post("/api/created", &json!({})).await.unwrap();
    assert!(created.is_none());

    assert_eq!(
        *log.lock().await,
        vec![
            "rec:request",
            "rec:response:204",
            "rec:request",
            "rec:response:204",
            "rec:request",
            "rec:response:201",
        ]
    );
}

#[tokio::test]
async fn test_undecodable_success_body_is_an_error_with_status() {
    let addr = spawn_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(addr, &log);

    let err = client.get::<Value>("/api/plain").await.unwrap_err();

    assert_eq!(err.status, Some(200));
    assert_eq!(err.data, Some(json!("all good")));
    assert!(err.message.starts_with("Invalid response body"));
    assert_eq!(*log.lock().await, vec!["rec:request", "rec:error:200"]);
}

#[tokio::test]
async fn test_mismatched_success_shape_goes_through_error_stages() {
    let addr = spawn_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(addr, &log);

    // The echo endpoint answers with an object, not a list
    let err = client.get::<Vec<String>>("/api/echo").await.unwrap_err();

    assert_eq!(err.status, Some(200));
    assert!(err.data.is_some());
    assert_eq!(*log.lock().await, vec!["rec:request", "rec:error:200"]);
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let addr = spawn_server().await;
    let (client, _session) = signed_in(addr).await;

    client.delete("/api/saved").await.unwrap();
    let err = client.delete("/api/plain").await.unwrap_err();
    assert_eq!(err.status, Some(405));
}
