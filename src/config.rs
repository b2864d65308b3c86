//! Configuration Module
//!
//! Handles loading server and client configuration from environment variables.

use std::env;
use std::time::Duration;

use tracing::warn;

// == Constants ==
/// Environment variables consulted for the API base URL, in priority order.
pub const BASE_URL_VARS: [&str; 3] = ["EXPO_PUBLIC_API_URL", "API_URL", "API_BASE_URL"];

/// Base URL used when none of [`BASE_URL_VARS`] is set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Request timeout applied by the API client.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default period between cleanup passes.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface the HTTP listener binds to
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Managed/serverless hosting: no listener and no cleanup job
    pub serverless: bool,
    /// Seconds between reset-token cleanup passes
    pub cleanup_interval_secs: u64,
    /// Skip a cleanup tick while the previous pass is still running
    pub skip_overlapping_passes: bool,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `HOST` - Listener interface (default: 0.0.0.0)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `VERCEL` - Any non-empty value marks serverless hosting
    /// - `CLEANUP_INTERVAL` - Cleanup period in seconds (default: 60)
    /// - `CLEANUP_SKIP_OVERLAP` - `true`/`1` skips ticks while a pass runs
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            serverless: lookup("VERCEL").map_or(false, |v| !v.is_empty()),
            cleanup_interval_secs: lookup("CLEANUP_INTERVAL")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.cleanup_interval_secs),
            skip_overlapping_passes: lookup("CLEANUP_SKIP_OVERLAP")
                .map_or(false, |v| is_truthy(&v)),
        }
    }

    /// Cleanup period as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            serverless: false,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            skip_overlapping_passes: false,
        }
    }
}

// == Client Config ==
/// Settings for [`crate::client::ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every relative request path is joined onto
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a ClientConfig pointing at `base_url` with the standard timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: CLIENT_TIMEOUT,
        }
    }

    /// Resolves the base URL from the process environment.
    ///
    /// Warns outside production builds when `EXPO_PUBLIC_API_URL` is missing.
    pub fn from_env() -> Self {
        let lookup = |name: &str| env::var(name).ok();
        let base_url = resolve_base_url(lookup);

        let primary_missing = lookup(BASE_URL_VARS[0]).map_or(true, |v| v.is_empty());
        let production = lookup("NODE_ENV").as_deref() == Some("production");
        if primary_missing && !production {
            warn!(
                "{} is not set, using fallback: {}",
                BASE_URL_VARS[0], base_url
            );
        }

        Self::new(base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

// == Helpers ==
/// Picks the first non-empty value of [`BASE_URL_VARS`], else [`DEFAULT_BASE_URL`].
pub fn resolve_base_url(lookup: impl Fn(&str) -> Option<String>) -> String {
    BASE_URL_VARS
        .iter()
        .filter_map(|&name| lookup(name))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
