use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Error types for X402 autopay codec operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// JSON serialization/deserialization errors.
    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Base64 encoding/decoding errors.
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// UTF-8 decoding errors.
    #[error("UTF-8 decode error: {0}")]
    Utf8DecodeError(#[from] std::string::FromUtf8Error),

    /// A 402 response carried no payment requirements in either the header or the body.
    #[error("Payment requirements missing from challenge")]
    MissingRequirements,
}

/// A specialized `Result` type for X402 autopay codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed taxonomy of payment outcomes that are not a plain success.
///
/// Serialized as a snake_case reason code, which is what callers see in
/// `AgentResult::reason` and in ledger failure summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No endpoint could be resolved for the payable.
    NoEndpoint,
    /// The 402 challenge could not be parsed.
    MalformedChallenge,
    /// The requirements were expired or exceeded the authorized maximum.
    RequirementsRejected,
    /// The payer identity refused (or was cancelled) to authorize.
    AuthorizationDenied,
    /// The paid retry was not accepted by the resource.
    PaymentRejected,
    /// A matching payment was seen within the duplicate window.
    FraudDetected,
    /// The payment would exceed the monthly budget.
    BudgetExceeded,
    /// An approval request was not approved.
    ApprovalDenied,
    /// Transport-level failure talking to the resource.
    NetworkError,
    /// The payable's cost is negative or cannot be represented in token units.
    InvalidAmount,
    /// Anything else; surfaced together with a security alert.
    UnexpectedError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoEndpoint => "no_endpoint",
            ErrorKind::MalformedChallenge => "malformed_challenge",
            ErrorKind::RequirementsRejected => "requirements_rejected",
            ErrorKind::AuthorizationDenied => "authorization_denied",
            ErrorKind::PaymentRejected => "payment_rejected",
            ErrorKind::FraudDetected => "fraud_detected",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::ApprovalDenied => "approval_denied",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::UnexpectedError => "unexpected_error",
        }
    }

    /// Whether this outcome is produced by the policy engine before any network call.
    pub fn is_policy_block(&self) -> bool {
        matches!(
            self,
            ErrorKind::FraudDetected | ErrorKind::BudgetExceeded | ErrorKind::ApprovalDenied
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
