//! Tunables for the probe-then-fetch protocol.

use serde::{Deserialize, Serialize};

/// Largest slack margin `OperationConfig::validate` accepts.
pub const MAX_SLACK: usize = 4096;

/// What to do when an attribute grows between the size probe and the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationPolicy {
    /// Run one more probe/fetch cycle, then give up with `Truncated`.
    #[default]
    RetryOnce,
    /// Report `Truncated` on the first mismatch.
    Fail,
}

impl TruncationPolicy {
    /// Number of probe/fetch cycles attempted before giving up.
    pub fn max_attempts(&self) -> u32 {
        match self {
            TruncationPolicy::RetryOnce => 2,
            TruncationPolicy::Fail => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TruncationPolicy::RetryOnce => "retry-once",
            TruncationPolicy::Fail => "fail",
        }
    }
}

impl std::fmt::Display for TruncationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TruncationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retry-once" | "retry" => Ok(TruncationPolicy::RetryOnce),
            "fail" => Ok(TruncationPolicy::Fail),
            _ => Err(format!("Unknown truncation policy: {}", s)),
        }
    }
}

/// Configuration for [`crate::XattrOperations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Extra bytes allocated past the probed size.
    pub slack: usize,

    /// Behavior when the probed size turns out too small.
    pub truncation: TruncationPolicy,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            slack: 1,
            truncation: TruncationPolicy::RetryOnce,
        }
    }
}

impl OperationConfig {
    /// Creates an OperationConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn with_slack(mut self, slack: usize) -> Self {
        self.slack = slack;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.slack > MAX_SLACK {
            errors.push(format!("slack must not exceed {} bytes, got {}", MAX_SLACK, self.slack));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
