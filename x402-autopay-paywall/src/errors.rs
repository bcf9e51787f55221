use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::{Value, json};
use x402_autopay_core::{
    transport::{PAYMENT_REQUIRED_HEADER, PaymentRequirements},
    types::Base64EncodedHeader,
};

use crate::paywall::ChallengeEncoding;

/// Represents an error response from the paywall.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub header: Option<ErrorResponseHeader>,
    /// The JSON body of the error response.
    pub body: Value,
}

/// Represents the challenge header to include in a paywall error response.
#[derive(Debug, Clone)]
pub enum ErrorResponseHeader {
    /// `x-payment-required` carrying JSON or base64 JSON requirements.
    PaymentRequired(String),
}

impl ErrorResponseHeader {
    /// Get the header value to include in the response.
    ///
    /// Returns `None` if the header value could not be created.
    pub fn header_value(self) -> Option<(HeaderName, HeaderValue)> {
        match self {
            ErrorResponseHeader::PaymentRequired(s) => HeaderValue::from_str(&s)
                .ok()
                .map(|v| (HeaderName::from_static(PAYMENT_REQUIRED_HEADER), v)),
        }
    }
}

impl ErrorResponse {
    /// 402 challenge carrying fresh requirements in the configured encoding.
    pub fn payment_required(
        requirements: &PaymentRequirements,
        encoding: ChallengeEncoding,
    ) -> Self {
        Self::challenge(
            "Payment required",
            "This resource requires payment via x402. Include an X-PAYMENT header and retry.",
            requirements,
            encoding,
        )
    }

    /// 402 challenge for a request whose authorization was not accepted.
    pub fn payment_rejected(
        reason: &str,
        requirements: &PaymentRequirements,
        encoding: ChallengeEncoding,
    ) -> Self {
        Self::challenge("Payment rejected", reason, requirements, encoding)
    }

    fn challenge(
        error: &str,
        message: &str,
        requirements: &PaymentRequirements,
        encoding: ChallengeEncoding,
    ) -> Self {
        let header = match encoding {
            ChallengeEncoding::JsonHeader => serde_json::to_string(requirements).ok(),
            ChallengeEncoding::Base64Header => {
                Base64EncodedHeader::encode(requirements).ok().map(|h| h.0)
            }
            ChallengeEncoding::Body => None,
        };

        let body = match encoding {
            ChallengeEncoding::Body => json!({
                "error": error,
                "message": message,
                "paymentRequirements": requirements,
            }),
            _ => json!({ "error": error, "message": message }),
        };

        ErrorResponse {
            status: StatusCode::PAYMENT_REQUIRED,
            header: header.map(ErrorResponseHeader::PaymentRequired),
            body,
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status, axum::extract::Json(self.body)).into_response();
        if let Some((name, val)) = self.header.and_then(ErrorResponseHeader::header_value) {
            response.headers_mut().insert(name, val);
        }
        response
    }
}
