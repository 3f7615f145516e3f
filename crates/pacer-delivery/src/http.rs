//! HTTP delivery adapter.
//!
//! Posts `{"recipient": {"id": ..}, "message": {"text": ..}}` to the configured
//! messages endpoint with the stored credential as a bearer token.
//!
//! # Failure Handling
//!
//! Transport errors, non-2xx responses, and 2xx responses whose JSON body
//! carries an `error` field are all reported as failures. The engine does not
//! distinguish between them.

use std::sync::Arc;
use std::time::Duration;

use pacer_core::RecipientId;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::HttpDeliveryConfig;
use crate::credential::CredentialStore;
use crate::error::{DeliveryError, DeliveryResult};
use crate::port::{BoxFuture, DeliveryPort, SendResult};

/// Longest response body kept in a `SendResult::Rejected`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: RecipientRef<'a>,
    message: MessageBody<'a>,
}

#[derive(Debug, Serialize)]
struct RecipientRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    text: &'a str,
}

/// Delivery port backed by an authenticated HTTP messaging API.
pub struct HttpDelivery {
    client: Client,
    endpoint: String,
    credentials: Arc<CredentialStore>,
}

impl HttpDelivery {
    /// Create a new HTTP delivery adapter.
    pub fn new(
        config: &HttpDeliveryConfig,
        credentials: Arc<CredentialStore>,
    ) -> DeliveryResult<Self> {
        if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
            return Err(DeliveryError::InvalidEndpoint(config.endpoint.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DeliveryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            credentials,
        })
    }

    /// Endpoint messages are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, recipient: &RecipientId, text: &str) -> SendResult {
        let Some(token) = self.credentials.get() else {
            return SendResult::NotReady;
        };

        let request = SendRequest {
            recipient: RecipientRef {
                id: recipient.as_str(),
            },
            message: MessageBody { text },
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Delivery request failed");
                return SendResult::Transport(e.to_string());
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(recipient = %recipient, status = status.as_u16(), error = %e, "Failed to read delivery response");
                return SendResult::Transport(e.to_string());
            }
        };

        if !status.is_success() {
            warn!(recipient = %recipient, status = status.as_u16(), "Delivery rejected");
            return SendResult::Rejected {
                status: status.as_u16(),
                body: truncate(&body),
            };
        }

        // A 2xx can still carry an API-level error object.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if value.get("error").is_some_and(|e| !e.is_null()) {
                warn!(recipient = %recipient, "Delivery rejected by API error body");
                return SendResult::Rejected {
                    status: status.as_u16(),
                    body: truncate(&body),
                };
            }
        }

        debug!(recipient = %recipient, len = text.len(), "Message delivered");
        SendResult::Delivered
    }
}

impl DeliveryPort for HttpDelivery {
    fn send<'a>(
        &'a self,
        recipient: &'a RecipientId,
        text: &'a str,
    ) -> BoxFuture<'a, SendResult> {
        Box::pin(self.post(recipient, text))
    }

    fn is_ready(&self) -> bool {
        self.credentials.is_present()
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
