//! Carrier configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CarrierError, CarrierResult};

/// Placeholder shown instead of credentials in logs and API responses.
const REDACTED: &str = "***REDACTED***";

/// Connection settings for a single carrier integration.
///
/// All fields have sensible defaults so a carrier can be enabled with an
/// empty config block and tightened later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// API credential for the carrier backend.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Account number registered with the carrier, when required.
    #[serde(default)]
    pub account_number: Option<String>,

    /// Override for the carrier API endpoint. Adapters fall back to their
    /// built-in sandbox endpoint when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for retry backoff in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Outbound request budget against this carrier.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_requests_per_minute() -> u32 {
    60
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            account_number: None,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl CarrierConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the carrier account number.
    #[must_use]
    pub fn with_account_number(mut self, account: impl Into<String>) -> Self {
        self.account_number = Some(account.into());
        self
    }

    /// Override the carrier API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the maximum retry attempts.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the per-minute request budget.
    #[must_use]
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the initial backoff as a Duration.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Get the maximum backoff as a Duration.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CarrierResult<()> {
        if self.timeout_secs == 0 {
            return Err(CarrierError::invalid_configuration(
                "timeout_secs must be greater than zero",
            ));
        }
        if self.requests_per_minute == 0 {
            return Err(CarrierError::invalid_configuration(
                "requests_per_minute must be greater than zero",
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(CarrierError::invalid_configuration(
                "max_backoff_ms must not be below initial_backoff_ms",
            ));
        }
        Ok(())
    }

    /// Create a redacted copy for logging and display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some(REDACTED.to_string());
        }
        copy
    }
}
