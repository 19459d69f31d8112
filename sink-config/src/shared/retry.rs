use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Retry behavior for transient table store failures during a commit.
///
/// Only store errors classified as transient are retried. Schema conflicts and malformed data
/// fail the commit on the first attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CommitRetryConfig {
    /// Total number of attempts, including the first one.
    ///
    /// Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    ///
    /// Default: 500ms
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Upper bound for the delay between two attempts, in milliseconds.
    ///
    /// Default: 30000ms
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt. Must be >= 1.0.
    ///
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl CommitRetryConfig {
    /// Returns the initial retry delay as a [`Duration`].
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    /// Returns the maximum retry delay as a [`Duration`].
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    /// Validates retry settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "commit_retry.max_attempts".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if !(self.backoff_multiplier >= 1.0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "commit_retry.backoff_multiplier".to_string(),
                constraint: "must be greater than or equal to 1.0".to_string(),
            });
        }

        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "commit_retry.initial_retry_delay_ms".to_string(),
                constraint: "must not exceed `max_retry_delay_ms`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CommitRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
