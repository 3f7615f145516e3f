//! Control API request and response types.
//!
//! Field names are camelCase on the wire. Older clients send `cookie`,
//! `speed`, `name` and `threadID`; those are accepted as aliases.

use pacer_core::{
    ConfigPatch, DispatchConfig, DispatchError, DispatchResult, FailurePolicy, RecipientId, RunId,
};
use serde::{Deserialize, Serialize};

/// `POST /api/credential`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    #[serde(default, alias = "cookie")]
    pub credential: Option<String>,
}

/// `POST /api/queue`. Exactly one source must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<String>>,
}

/// Delay as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DelayValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DelayValue {
    /// Milliseconds, or `InvalidArgument` if the value is not an integer.
    pub fn to_millis(&self) -> DispatchResult<i64> {
        match self {
            Self::Integer(ms) => Ok(*ms),
            Self::Float(ms) if ms.fract() == 0.0 && ms.is_finite() => Ok(*ms as i64),
            Self::Float(ms) => Err(invalid_delay(ms)),
            Self::Text(raw) => raw.trim().parse().map_err(|_| invalid_delay(raw)),
        }
    }
}

fn invalid_delay(raw: impl std::fmt::Display) -> DispatchError {
    DispatchError::InvalidArgument(format!(
        "delayMillis must be a non-negative integer, got '{raw}'"
    ))
}

/// `POST /api/configure`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    #[serde(default, alias = "speed")]
    pub delay_millis: Option<DelayValue>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub failure_policy: Option<String>,
}

impl ConfigureRequest {
    /// Convert into an engine patch. Values are validated by the engine.
    pub fn into_patch(self) -> DispatchResult<ConfigPatch> {
        let delay_ms = self
            .delay_millis
            .as_ref()
            .map(DelayValue::to_millis)
            .transpose()?;
        let failure_policy = self
            .failure_policy
            .as_deref()
            .map(str::parse::<FailurePolicy>)
            .transpose()?;

        Ok(ConfigPatch {
            delay_ms,
            prefix: self.prefix,
            display_name: self.display_name,
            failure_policy,
        })
    }
}

/// `POST /api/start`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default, alias = "threadID")]
    pub recipient_id: Option<String>,
}

/// Plain acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigureResponse {
    pub success: bool,
    pub config: DispatchConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
    pub run_id: RunId,
    pub recipient_id: RecipientId,
    pub queue_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub success: bool,
    pub message: String,
    pub signalled: bool,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_accepts_legacy_names() {
        let req: ConfigureRequest =
            serde_json::from_str(r#"{"speed": "1500", "name": "bot"}"#).unwrap();
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.delay_ms, Some(1500));
        assert_eq!(patch.display_name.as_deref(), Some("bot"));
        assert!(patch.prefix.is_none());
    }

    #[test]
    fn test_configure_delay_forms() {
        for (body, expected) in [
            (r#"{"delayMillis": 250}"#, 250),
            (r#"{"delayMillis": 250.0}"#, 250),
            (r#"{"delayMillis": " 250 "}"#, 250),
            (r#"{"delayMillis": -1}"#, -1),
        ] {
            let req: ConfigureRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.into_patch().unwrap().delay_ms, Some(expected), "{body}");
        }

        for body in [r#"{"delayMillis": "fast"}"#, r#"{"delayMillis": 1.5}"#] {
            let req: ConfigureRequest = serde_json::from_str(body).unwrap();
            assert!(req.into_patch().is_err(), "{body}");
        }
    }

    #[test]
    fn test_configure_failure_policy() {
        let req: ConfigureRequest =
            serde_json::from_str(r#"{"failurePolicy": "continue"}"#).unwrap();
        assert_eq!(
            req.into_patch().unwrap().failure_policy,
            Some(FailurePolicy::Continue)
        );

        let req: ConfigureRequest =
            serde_json::from_str(r#"{"failurePolicy": "sometimes"}"#).unwrap();
        assert!(req.into_patch().is_err());
    }

    #[test]
    fn test_start_accepts_thread_id() {
        let req: StartRequest = serde_json::from_str(r#"{"threadID": "42"}"#).unwrap();
        assert_eq!(req.recipient_id.as_deref(), Some("42"));
        let req: StartRequest = serde_json::from_str(r#"{"recipientId": "43"}"#).unwrap();
        assert_eq!(req.recipient_id.as_deref(), Some("43"));
    }

    #[test]
    fn test_credential_accepts_cookie() {
        let req: CredentialRequest = serde_json::from_str(r#"{"cookie": "c=1"}"#).unwrap();
        assert_eq!(req.credential.as_deref(), Some("c=1"));
    }
}
