//! Carrier boundary shared types.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an unknown carrier name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown carrier: {value}")]
pub struct ParseCarrierTypeError {
    /// The string that failed to parse.
    pub value: String,
}

/// Supported carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierType {
    /// United Parcel Service.
    Ups,
    /// FedEx (Federal Express).
    Fedex,
    /// DHL Express and DHL eCommerce.
    Dhl,
    /// United States Postal Service.
    Usps,
}

impl CarrierType {
    /// Returns the carrier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ups => "ups",
            Self::Fedex => "fedex",
            Self::Dhl => "dhl",
            Self::Usps => "usps",
        }
    }

    /// Returns the carrier's display name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ups => "UPS",
            Self::Fedex => "FedEx",
            Self::Dhl => "DHL",
            Self::Usps => "USPS",
        }
    }

    /// Returns all supported carriers.
    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::Ups, Self::Fedex, Self::Dhl, Self::Usps]
    }
}

impl Display for CarrierType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CarrierType {
    type Err = ParseCarrierTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ups" => Ok(Self::Ups),
            "fedex" => Ok(Self::Fedex),
            "dhl" => Ok(Self::Dhl),
            "usps" => Ok(Self::Usps),
            _ => Err(ParseCarrierTypeError {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_roundtrip() {
        for carrier in CarrierType::all() {
            let parsed: CarrierType = carrier.as_str().parse().unwrap();
            assert_eq!(parsed, carrier);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let parsed: CarrierType = "FedEx".parse().unwrap();
        assert_eq!(parsed, CarrierType::Fedex);
    }

    #[test]
    fn test_parse_unknown_carrier() {
        let err = "ontrac".parse::<CarrierType>().unwrap_err();
        assert_eq!(err.value, "ontrac");
    }

    #[test]
    fn test_labels() {
        assert_eq!(CarrierType::Ups.label(), "UPS");
        assert_eq!(CarrierType::Usps.label(), "USPS");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CarrierType::Dhl).unwrap();
        assert_eq!(json, "\"dhl\"");
    }
}
