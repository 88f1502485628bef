//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, StoreError};
use crate::types::{ApiUrl, ExemptEndpoints};

/// Paths of the session endpoints, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthPaths {
    pub login: String,
    pub refresh: String,
    pub check: String,
    pub logout: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            refresh: "/api/auth/refresh".to_string(),
            check: "/api/auth/check".to_string(),
            logout: "/api/auth/logout".to_string(),
        }
    }
}

/// Configuration for a [`SessionClient`](crate::SessionClient).
///
/// Every field except `baseUrl` has a default, so a minimal JSON file is
/// `{"baseUrl": "https://admin.example.com"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL of the administration API.
    pub base_url: ApiUrl,

    /// Endpoints that never carry the access token and never trigger a refresh.
    #[serde(default)]
    pub exempt: ExemptEndpoints,

    /// Session endpoint paths.
    #[serde(default)]
    pub auth: AuthPaths,

    /// Timeout for ordinary requests and replays, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on a single refresh exchange, in seconds.
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,

    /// Interval between liveness checks of the refresh token, in seconds.
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,

    /// Capacity of the session event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_exchange_timeout_secs() -> u64 {
    10
}

fn default_liveness_interval_secs() -> u64 {
    300
}

fn default_event_capacity() -> usize {
    64
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL.
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            exempt: ExemptEndpoints::default(),
            auth: AuthPaths::default(),
            request_timeout_secs: default_request_timeout_secs(),
            exchange_timeout_secs: default_exchange_timeout_secs(),
            liveness_interval_secs: default_liveness_interval_secs(),
            event_capacity: default_event_capacity(),
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&contents).map_err(StoreError::from)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Never shorter than one second.
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs.max(1))
    }

    /// Never shorter than one second.
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs.max(1))
    }
}
