//! HTTP delivery adapter configuration.

use serde::{Deserialize, Serialize};

/// Outbound messaging API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDeliveryConfig {
    /// Messages endpoint that receives `{recipient, message}` posts.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout (ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://graph.facebook.com/v17.0/me/messages".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for HttpDeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HttpDeliveryConfig {
    /// Config pointing at a custom endpoint with the default timeout.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}
