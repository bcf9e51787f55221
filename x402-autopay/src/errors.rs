use x402_autopay_core::{errors::ErrorKind, transport::RequirementsRejection};

/// Failures of one challenge/response exchange.
///
/// Every variant is an expected outcome of talking to a paid resource; use
/// [`ProtocolError::kind`] to map it onto the reason taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed payment challenge: {0}")]
    MalformedChallenge(#[source] x402_autopay_core::errors::Error),

    #[error("Payment requirements rejected: {0}")]
    RequirementsRejected(#[from] RequirementsRejection),

    #[error("Payer declined to authorize: {0}")]
    AuthorizationDenied(String),

    #[error("Authorization cancelled")]
    Cancelled,

    /// The paid retry was answered with another 402 or a non-success status.
    #[error("Payment rejected by resource with status {status}: {message}")]
    PaymentRejected { status: u16, message: String },
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidEndpoint(_) | ProtocolError::Network(_) => {
                ErrorKind::NetworkError
            }
            ProtocolError::MalformedChallenge(_) => ErrorKind::MalformedChallenge,
            ProtocolError::RequirementsRejected(_) => ErrorKind::RequirementsRejected,
            ProtocolError::AuthorizationDenied(_) | ProtocolError::Cancelled => {
                ErrorKind::AuthorizationDenied
            }
            ProtocolError::PaymentRejected { .. } => ErrorKind::PaymentRejected,
        }
    }

    /// HTTP status of the final response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProtocolError::PaymentRejected { status, .. } => Some(*status),
            ProtocolError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Storage failures of the transaction ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Failures the agent does not expect during a payment.
///
/// These never reach the caller of `pay()` as `Err`; they are turned into a
/// security alert and an `unexpected_error` result.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_counts_as_denial() {
        assert_eq!(ProtocolError::Cancelled.kind(), ErrorKind::AuthorizationDenied);
        assert_eq!(
            ProtocolError::PaymentRejected {
                status: 402,
                message: "second challenge".into()
            }
            .kind(),
            ErrorKind::PaymentRejected
        );
        assert_eq!(
            ProtocolError::from(RequirementsRejection::Expired {
                expires_at: 1,
                now: 2
            })
            .kind(),
            ErrorKind::RequirementsRejected
        );
    }
}
