//! Wire-level types of the payment-required challenge/response exchange.
//!
//! A protected resource answers an unpaid request with HTTP 402 and a
//! [`PaymentRequirements`] payload, either in the `x-payment-required` header
//! (JSON, or base64-encoded JSON) or in the response body. The client retries
//! once with a [`PaymentAuthorization`] in the `x-payment` header.

use std::fmt::{Debug, Display};

use bon::Builder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    errors::{Error, Result},
    types::{AmountValue, AnyJson, Base64EncodedHeader, EpochMillis},
};

/// Response header carrying the payment terms of a 402 challenge.
pub const PAYMENT_REQUIRED_HEADER: &str = "x-payment-required";

/// Request header carrying the payment authorization on the retried request.
pub const PAYMENT_HEADER: &str = "x-payment";

/// Payment terms returned by a resource when payment is missing.
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Amount required, in the token's smallest units.
    #[builder(into)]
    pub amount: AmountValue,
    /// Token contract address or identifier.
    #[serde(alias = "tokenIdentifier", alias = "asset")]
    #[builder(into)]
    pub token: String,
    /// Address or account the payment goes to.
    #[serde(alias = "recipientAddress", alias = "payTo")]
    #[builder(into)]
    pub recipient: String,
    /// Network hint, e.g. `"polygon"` or `"eip155:8453"`.
    #[serde(alias = "network")]
    #[builder(into)]
    pub chain: String,
    /// Absolute expiry in epoch milliseconds.
    pub expires_at: EpochMillis,
    /// Extra fields for extensibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<AnyJson>,
}

/// Why a client refused to pay the offered requirements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementsRejection {
    #[error("Payment requirements expired at {expires_at} (now {now})")]
    Expired {
        expires_at: EpochMillis,
        now: EpochMillis,
    },
    #[error("Required amount {amount} exceeds authorized maximum {max}")]
    OverLimit {
        amount: AmountValue,
        max: AmountValue,
    },
}

impl PaymentRequirements {
    pub fn is_expired_at(&self, now: EpochMillis) -> bool {
        self.expires_at <= now
    }

    /// Check the terms against the clock and an optional authorized maximum.
    pub fn validate(
        &self,
        now: EpochMillis,
        max_authorized: Option<AmountValue>,
    ) -> std::result::Result<(), RequirementsRejection> {
        if self.is_expired_at(now) {
            return Err(RequirementsRejection::Expired {
                expires_at: self.expires_at,
                now,
            });
        }
        match max_authorized {
            Some(max) if self.amount > max => Err(RequirementsRejection::OverLimit {
                amount: self.amount,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Parse requirements from an `x-payment-required` header value.
    ///
    /// Accepts raw JSON and base64-encoded JSON.
    pub fn from_header_value(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        let json = Base64EncodedHeader(trimmed.to_string()).decode_json()?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Parse requirements from a 402 response body.
    ///
    /// Accepts the bare requirements object, `{"paymentRequirements": {...}}`, or
    /// `{"accepts": [...]}` (first entry wins).
    pub fn from_body(body: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<ChallengeBody>(body)? {
            ChallengeBody::Bare(requirements) => Ok(requirements),
            ChallengeBody::Wrapped {
                payment_requirements,
            } => Ok(payment_requirements),
            ChallengeBody::Accepts { accepts } => {
                accepts.into_iter().next().ok_or(Error::MissingRequirements)
            }
        }
    }

    /// Decode a 402 challenge, preferring the header and falling back to the body.
    ///
    /// When both encodings fail the header's error is reported, since a header
    /// that is present but unreadable is the more specific problem.
    pub fn from_challenge(header: Option<&str>, body: &[u8]) -> Result<Self> {
        let header_err = match header {
            Some(value) => match Self::from_header_value(value) {
                Ok(requirements) => return Ok(requirements),
                Err(err) => Some(err),
            },
            None => None,
        };

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(header_err.unwrap_or(Error::MissingRequirements));
        }

        Self::from_body(body).map_err(|body_err| header_err.unwrap_or(body_err))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChallengeBody {
    Bare(PaymentRequirements),
    Wrapped {
        #[serde(rename = "paymentRequirements")]
        payment_requirements: PaymentRequirements,
    },
    Accepts {
        accepts: Vec<PaymentRequirements>,
    },
}

/// Opaque signed artifact proving the payer committed to a set of requirements.
///
/// Consumed exactly once by attaching it to the retried request. The `Debug`
/// output never contains the artifact; use [`PaymentAuthorization::reference`]
/// wherever an identifier is needed.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentAuthorization(String);

impl PaymentAuthorization {
    pub fn new(value: impl Into<String>) -> Self {
        PaymentAuthorization(value.into())
    }

    /// Encode a scheme-specific payload as base64 JSON, the usual `x-payment` encoding.
    pub fn from_payload<T: Serialize>(payload: &T) -> Result<Self> {
        Ok(PaymentAuthorization(Base64EncodedHeader::encode(payload)?.0))
    }

    /// The raw value to place in the `x-payment` header.
    pub fn header_value(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// A stable, non-reversible identifier for audit records.
    pub fn reference(&self) -> AuthorizationRef {
        let digest = Sha256::digest(self.0.as_bytes());
        AuthorizationRef(format!("auth_{}", &hex::encode(digest)[..16]))
    }
}

impl Debug for PaymentAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentAuthorization(<redacted>)")
    }
}

/// Fingerprint of a [`PaymentAuthorization`], safe to persist and log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationRef(pub String);

impl Display for AuthorizationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
