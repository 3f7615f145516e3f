//! Runtime dispatch configuration and partial updates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DispatchError, DispatchResult};

/// Upper bound for the inter-item delay (one hour).
pub const MAX_DELAY_MS: u64 = 3_600_000;

/// Upper bound for prefix and display name length, in characters.
pub const MAX_TEXT_LEN: usize = 4096;

/// What the run loop does when the delivery port reports a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failed item.
    #[default]
    Abort,
    /// Record the failure and keep dispatching the remaining items.
    Continue,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "fail-fast" | "fail_fast" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(DispatchError::InvalidArgument(format!(
                "failurePolicy must be 'abort' or 'continue', got '{other}'"
            ))),
        }
    }
}

/// Dispatch configuration owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Delay between two consecutive items (ms). Default: 1000.
    #[serde(rename = "delayMillis", default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Text prepended to every item, separated by a single space.
    #[serde(default)]
    pub prefix: String,
    /// Operator-facing label, reported back in status.
    #[serde(default)]
    pub display_name: String,
    /// Reaction to a failed delivery.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_delay_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            prefix: String::new(),
            display_name: String::new(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl DispatchConfig {
    /// Apply a partial update, returning the merged configuration.
    ///
    /// The patch is validated as a whole before anything is merged, so an
    /// invalid field leaves `self` untouched.
    pub fn apply(&mut self, patch: &ConfigPatch) -> DispatchResult<&Self> {
        patch.validate()?;

        if let Some(delay_ms) = patch.delay_ms {
            // validate() guarantees 0..=MAX_DELAY_MS
            self.delay_ms = delay_ms as u64;
        }
        if let Some(prefix) = &patch.prefix {
            self.prefix = prefix.clone();
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(policy) = patch.failure_policy {
            self.failure_policy = policy;
        }

        Ok(self)
    }

    /// Inter-item delay as a `Duration`.
    #[must_use]
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_ms)
    }
}

/// Partial configuration update. Absent fields are left unchanged.
///
/// `delay_ms` is signed so that a negative request reaches validation and is
/// reported as an invalid argument rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub delay_ms: Option<i64>,
    pub prefix: Option<String>,
    pub display_name: Option<String>,
    pub failure_policy: Option<FailurePolicy>,
}

impl ConfigPatch {
    /// Patch that only sets the delay.
    #[must_use]
    pub fn delay(delay_ms: i64) -> Self {
        Self {
            delay_ms: Some(delay_ms),
            ..Self::default()
        }
    }

    /// Patch that only sets the prefix.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// True if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delay_ms.is_none()
            && self.prefix.is_none()
            && self.display_name.is_none()
            && self.failure_policy.is_none()
    }

    /// Validate every present field.
    pub fn validate(&self) -> DispatchResult<()> {
        if let Some(delay_ms) = self.delay_ms {
            if delay_ms < 0 {
                return Err(DispatchError::InvalidArgument(format!(
                    "delayMillis must be >= 0, got {delay_ms}"
                )));
            }
            if delay_ms as u64 > MAX_DELAY_MS {
                return Err(DispatchError::InvalidArgument(format!(
                    "delayMillis must be <= {MAX_DELAY_MS}, got {delay_ms}"
                )));
            }
        }
        check_text_len("prefix", self.prefix.as_deref())?;
        check_text_len("displayName", self.display_name.as_deref())?;
        Ok(())
    }
}

fn check_text_len(field: &str, value: Option<&str>) -> DispatchResult<()> {
    match value {
        Some(v) if v.chars().count() > MAX_TEXT_LEN => Err(DispatchError::InvalidArgument(
            format!("{field} must be at most {MAX_TEXT_LEN} characters"),
        )),
        _ => Ok(()),
    }
}
