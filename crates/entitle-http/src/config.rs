//! HTTP store configuration

use serde::{Deserialize, Serialize};

/// Connection settings for the entitlement service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreConfig {
    /// Service base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".into(),
            api_key: None,
            timeout_secs: 30,
            user_agent: format!("entitle/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpStoreConfig {
    /// Defaults pointed at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}
