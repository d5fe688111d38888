//! Carrier boundary error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

use crate::types::CarrierType;

/// Error that can occur when talking to a carrier.
#[derive(Debug, Error)]
pub enum CarrierError {
    // Upstream errors (usually transient)
    /// Carrier API call failed.
    #[error("{carrier} api error: {message}")]
    ApiError {
        carrier: CarrierType,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Carrier API call timed out.
    #[error("{carrier} request timed out after {timeout_secs} seconds")]
    Timeout {
        carrier: CarrierType,
        timeout_secs: u64,
    },

    /// Carrier rejected the request because of rate limiting.
    #[error("{carrier} rate limit exceeded")]
    RateLimited { carrier: CarrierType },

    /// Carrier API is temporarily unavailable.
    #[error("{carrier} is unavailable")]
    Unavailable { carrier: CarrierType },

    // Caller errors (permanent)
    /// Tracking number does not match the carrier's format.
    #[error("invalid {carrier} tracking number: {tracking}")]
    InvalidTrackingNumber {
        carrier: CarrierType,
        tracking: String,
    },

    /// No adapter is configured for the requested carrier.
    #[error("unsupported carrier: {name}")]
    UnsupportedCarrier { name: String },

    /// Webhook payload could not be translated.
    #[error("{carrier} webhook payload invalid: {message}")]
    WebhookParse {
        carrier: CarrierType,
        message: String,
    },

    /// Carrier configuration is invalid.
    #[error("invalid carrier configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl CarrierError {
    /// Create an API error.
    pub fn api(carrier: CarrierType, message: impl Into<String>) -> Self {
        Self::ApiError {
            carrier,
            message: message.into(),
            source: None,
        }
    }

    /// Create an API error with an underlying cause.
    pub fn api_with_source(
        carrier: CarrierType,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ApiError {
            carrier,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(carrier: CarrierType, timeout_secs: u64) -> Self {
        Self::Timeout {
            carrier,
            timeout_secs,
        }
    }

    /// Create a rate limited error.
    #[must_use]
    pub fn rate_limited(carrier: CarrierType) -> Self {
        Self::RateLimited { carrier }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(carrier: CarrierType) -> Self {
        Self::Unavailable { carrier }
    }

    /// Create an invalid tracking number error.
    pub fn invalid_tracking(carrier: CarrierType, tracking: impl Into<String>) -> Self {
        Self::InvalidTrackingNumber {
            carrier,
            tracking: tracking.into(),
        }
    }

    /// Create an unsupported carrier error.
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedCarrier { name: name.into() }
    }

    /// Create a webhook parse error.
    pub fn webhook_parse(carrier: CarrierType, message: impl Into<String>) -> Self {
        Self::WebhookParse {
            carrier,
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Check if this error is transient (retry may succeed).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ApiError { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Unavailable { .. }
        )
    }

    /// Check if this error is permanent (retry will not help).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get a short error code for logging and API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ApiError { .. } => "api_error",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::InvalidTrackingNumber { .. } => "invalid_tracking_number",
            Self::UnsupportedCarrier { .. } => "unsupported_carrier",
            Self::WebhookParse { .. } => "webhook_parse",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
        }
    }
}

/// Result type for carrier operations.
pub type CarrierResult<T> = Result<T, CarrierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CarrierError::api(CarrierType::Ups, "503 from upstream");
        assert!(err.to_string().contains("ups"));
        assert!(err.to_string().contains("503 from upstream"));

        let err = CarrierError::invalid_tracking(CarrierType::Fedex, "12");
        assert!(err.to_string().contains("fedex"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CarrierError::api(CarrierType::Dhl, "boom").is_transient());
        assert!(CarrierError::timeout(CarrierType::Ups, 30).is_transient());
        assert!(CarrierError::rate_limited(CarrierType::Usps).is_transient());
        assert!(CarrierError::unavailable(CarrierType::Fedex).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(CarrierError::invalid_tracking(CarrierType::Ups, "XYZ").is_permanent());
        assert!(CarrierError::unsupported("ontrac").is_permanent());
        assert!(CarrierError::webhook_parse(CarrierType::Dhl, "missing field").is_permanent());
        assert!(CarrierError::invalid_configuration("timeout is zero").is_permanent());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CarrierError::timeout(CarrierType::Ups, 5).error_code(),
            "timeout"
        );
        assert_eq!(
            CarrierError::unsupported("ontrac").error_code(),
            "unsupported_carrier"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = CarrierError::api_with_source(CarrierType::Ups, "transport", Box::new(inner));
        assert!(std::error::Error::source(&err).is_some());
    }
}
