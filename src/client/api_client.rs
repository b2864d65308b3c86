//! API Client
//!
//! reqwest wrapper that runs every exchange through an ordered list of
//! [`Stage`]s and reports every failure as an [`ApiError`].

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;

use crate::client::error::ApiError;
use crate::client::pipeline::{BearerAuth, RequestLogger, ResponseMeta, SessionReset, Stage};
use crate::client::storage::{KeyValueStore, Session};
use crate::config::ClientConfig;

// == Builder ==
/// Assembles an [`ApiClient`] and its stage list.
pub struct ApiClientBuilder {
    config: ClientConfig,
    stages: Vec<Arc<dyn Stage>>,
}

impl ApiClientBuilder {
    /// Appends a stage. Stages run in the order they were added.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Builds the client with the configured timeout and JSON content type.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = Url::parse(&self.config.base_url).map_err(|e| {
            ApiError::normalize(
                None,
                Some(&format!("Invalid base URL '{}': {}", self.config.base_url, e)),
                None,
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(self.config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::from_transport(&e))?;

        Ok(ApiClient {
            http,
            base_url,
            stages: self.stages,
        })
    }
}

// == Api Client ==
/// HTTP client for the budget API.
///
/// No retries are attempted; a failed call is reported once.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    stages: Vec<Arc<dyn Stage>>,
}

impl ApiClient {
    /// Starts a builder with no stages.
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            stages: Vec::new(),
        }
    }

    /// Client with the standard pipeline: logging, bearer auth, 401 reset.
    pub fn with_session(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ApiError> {
        let session = Session::new(storage);
        Self::builder(config)
            .stage(RequestLogger)
            .stage(BearerAuth::new(session.clone()))
            .stage(SessionReset::new(session))
            .build()
    }

    /// Base URL relative paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // == Send ==
    /// Sends one request through the pipeline and decodes the JSON body.
    ///
    /// A 2xx response whose body decodes into `T` is a success; an empty body
    /// decodes as JSON `null`, so `T = ()` or `Option<_>` accept 204 replies.
    /// Every other outcome, including an undecodable 2xx body, is an
    /// [`ApiError`] that has gone through the `on_error` stages.
    pub async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.resolve(path)?;

        let mut builder = self.http.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let mut request = builder.build().map_err(|e| ApiError::from_transport(&e))?;

        for stage in &self.stages {
            stage.on_request(&mut request).await;
        }

        let outcome = match self.http.execute(request).await {
            Ok(response) => read_response::<T>(response).await,
            Err(e) => Err(ApiError::from_transport(&e)),
        };

        match outcome {
            Ok((meta, value)) => {
                for stage in &self.stages {
                    stage.on_response(&meta).await;
                }
                Ok(value)
            }
            Err(error) => {
                for stage in &self.stages {
                    stage.on_error(&error, &url).await;
                }
                Err(error)
            }
        }
    }

    // == JSON Helpers ==
    /// GET `path` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    /// POST `body` to `path` and decode the JSON body.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// PUT `body` to `path` and decode the JSON body.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// DELETE `path`, ignoring any JSON body.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send::<(), IgnoredAny>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    /// Joins a relative path onto the base URL; absolute URLs pass through.
    fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }

        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| {
            ApiError::normalize(None, Some(&format!("Invalid request URL '{}': {}", joined, e)), None)
        })
    }
}

/// Reads a response to completion.
///
/// Non-2xx statuses and 2xx bodies that do not decode into `T` both become an
/// [`ApiError`] carrying the received status and payload.
async fn read_response<T: DeserializeOwned>(
    response: Response,
) -> Result<(ResponseMeta, T), ApiError> {
    let meta = ResponseMeta {
        status: response.status(),
        url: response.url().clone(),
    };

    let bytes = response.bytes().await.map_err(|e| {
        let transport_message = e.to_string();
        ApiError::normalize(None, Some(&transport_message), Some(meta.status.as_u16()))
    })?;

    if !meta.status.is_success() {
        return Err(ApiError::from_status(meta.status, payload(&bytes)));
    }

    let decoded = if bytes.is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(&bytes)
    };

    match decoded {
        Ok(value) => Ok((meta, value)),
        Err(e) => {
            // The body was a success payload, so its `message` is not an error text
            let transport_message = format!("Invalid response body: {}", e);
            let mut error =
                ApiError::normalize(None, Some(&transport_message), Some(meta.status.as_u16()));
            error.data = payload(&bytes);
            Err(error)
        }
    }
}

/// Raw payload as JSON; other non-empty bodies become a JSON string.
fn payload(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice::<Value>(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}
