//! Miscellaneous common types used throughout the X402 autopay codebase.

use std::fmt::Display;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

/// Arbitrary JSON, e.g. scheme-specific `extra` fields of payment requirements.
pub type AnyJson = serde_json::Value;

/// Milliseconds since the Unix epoch, the time unit used on the wire and in the ledger.
pub type EpochMillis = i64;

/// Represents a base64-encoded header value for X402 protocol headers.
///
/// Some resources send the `x-payment-required` JSON base64-encoded instead of raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedHeader(pub String);

impl Base64EncodedHeader {
    /// Encode a serializable value as base64 JSON.
    pub fn encode<T: Serialize>(value: &T) -> crate::errors::Result<Self> {
        let json = serde_json::to_string(value)?;
        Ok(Base64EncodedHeader(BASE64_STANDARD.encode(json)))
    }

    /// Decode the header back into its JSON text.
    pub fn decode_json(&self) -> crate::errors::Result<String> {
        let bytes = BASE64_STANDARD.decode(self.0.trim())?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl Serialize for Base64EncodedHeader {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64EncodedHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Base64EncodedHeader(s))
    }
}

impl Display for Base64EncodedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
