//! HTTP paywall issuing X402 payment-required challenges.
//!
//! For details, see the [`PayWall`] struct documentation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use bon::Builder;
use http::{Request, Response};
use x402_autopay_core::{
    transport::{PAYMENT_HEADER, PaymentAuthorization, PaymentRequirements},
    types::{AmountValue, EpochMillis},
};

use crate::{
    errors::ErrorResponse,
    processor::{PaymentState, RequestProcessor},
};

/// Where the paywall places the requirements of a 402 challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChallengeEncoding {
    /// JSON in the `x-payment-required` header.
    #[default]
    JsonHeader,
    /// Base64-encoded JSON in the `x-payment-required` header.
    Base64Header,
    /// JSON body under `paymentRequirements`, no header.
    Body,
}

/// Request counters shared by every clone of a [`PayWall`].
#[derive(Debug, Clone, Default)]
pub struct PayWallCounters {
    total: Arc<AtomicUsize>,
    challenged: Arc<AtomicUsize>,
    paid: Arc<AtomicUsize>,
}

impl PayWallCounters {
    /// All requests seen by the paywall.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Requests answered with a 402.
    pub fn challenged(&self) -> usize {
        self.challenged.load(Ordering::SeqCst)
    }

    /// Requests let through to the protected handler.
    pub fn paid(&self) -> usize {
        self.paid.load(Ordering::SeqCst)
    }
}

/// A HTTP paywall for local development and integration tests.
///
/// Without an `x-payment` header the paywall answers `402 Payment Required`
/// with freshly issued [`PaymentRequirements`] (`expiresAt = now + ttl`). With a
/// non-empty `x-payment` header it runs the protected handler.
///
/// The authorization itself is not verified against the issued terms. Real
/// resources verify and settle through a facilitator; this paywall only
/// implements the challenge side of the exchange.
///
/// ## Step-by-Step API
///
/// [`handle_payment`](PayWall::handle_payment) runs:
///
/// 1. **Process Request** ([`process_request`](PayWall::process_request)): extract the
///    `x-payment` header, or fail with a 402 challenge.
/// 2. **Run Handler** ([`RequestProcessor::run_handler`]): execute the resource handler
///    with [`PaymentState`] in the request extensions.
/// 3. **Response** ([`ResponseProcessor::response`](crate::processor::ResponseProcessor::response)):
///    optionally echo the authorization back in the `x-payment` response header.
#[derive(Builder, Debug, Clone)]
pub struct PayWall {
    /// Amount demanded, in smallest token units.
    #[builder(into)]
    pub amount: AmountValue,
    /// Token contract address or identifier.
    #[builder(into)]
    pub token: String,
    /// Merchant address.
    #[builder(into)]
    pub recipient: String,
    /// Network hint.
    #[builder(into)]
    pub chain: String,
    /// Validity of issued requirements in milliseconds. Negative values issue
    /// requirements that are already expired.
    #[builder(default = 5 * 60 * 1000)]
    pub ttl_ms: i64,
    /// Where to put the requirements.
    #[builder(default)]
    pub encoding: ChallengeEncoding,
    /// Answer every paid request with another 402.
    #[builder(default)]
    pub reject_payments: bool,
    /// Echo the received authorization in the `x-payment` response header.
    #[builder(default = true)]
    pub echo_authorization: bool,
    #[builder(default)]
    pub counters: PayWallCounters,
}

impl PayWall {
    /// Requirements valid from `now` for the configured TTL.
    pub fn requirements_at(&self, now: EpochMillis) -> PaymentRequirements {
        PaymentRequirements::builder()
            .amount(self.amount)
            .token(self.token.clone())
            .recipient(self.recipient.clone())
            .chain(self.chain.clone())
            .expires_at(now.saturating_add(self.ttl_ms))
            .build()
    }

    /// Entrypoint of the paywall flow.
    ///
    /// Returns a [`RequestProcessor`] when the request carries an authorization.
    pub fn process_request<Req>(
        &self,
        request: Request<Req>,
    ) -> Result<RequestProcessor<'_, Req>, ErrorResponse> {
        self.counters.total.fetch_add(1, Ordering::SeqCst);

        let authorization = request
            .headers()
            .get(PAYMENT_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(PaymentAuthorization::new)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| self.payment_required())?;

        let reference = authorization.reference();

        if self.reject_payments {
            #[cfg(feature = "tracing")]
            tracing::debug!("Rejecting payment authorization '{}'", reference);

            return Err(self.payment_rejected("Payment authorization rejected"));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Accepted payment authorization '{}'", reference);

        self.counters.paid.fetch_add(1, Ordering::SeqCst);

        Ok(RequestProcessor {
            paywall: self,
            request,
            payment_state: PaymentState {
                authorization: reference,
                echo: self
                    .echo_authorization
                    .then(|| authorization.header_value().to_string()),
            },
        })
    }

    /// Standard payment handling flow.
    ///
    /// Challenges unpaid requests and runs the handler for paid ones.
    pub async fn handle_payment<Fun, Fut, Req, Res>(
        &self,
        request: Request<Req>,
        handler: Fun,
    ) -> Result<Response<Res>, ErrorResponse>
    where
        Fun: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Response<Res>>,
    {
        let response = self
            .process_request(request)?
            .run_handler(handler)
            .await
            .response();

        Ok(response)
    }

    /// Payment needed to access resource
    pub fn payment_required(&self) -> ErrorResponse {
        self.counters.challenged.fetch_add(1, Ordering::SeqCst);
        ErrorResponse::payment_required(&self.requirements_at(now_millis()), self.encoding)
    }

    /// Authorization present but refused
    pub fn payment_rejected(&self, reason: &str) -> ErrorResponse {
        self.counters.challenged.fetch_add(1, Ordering::SeqCst);
        ErrorResponse::payment_rejected(reason, &self.requirements_at(now_millis()), self.encoding)
    }
}

pub(crate) fn now_millis() -> EpochMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as EpochMillis)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use http::{Request, Response, StatusCode};
    use x402_autopay_core::transport::PaymentRequirements;

    use super::*;
    use crate::errors::ErrorResponseHeader;

    fn paywall() -> PayWall {
        PayWall::builder()
            .amount(10000u64)
            .token("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
            .recipient("0x0000000000000000000000000000000000000000")
            .chain("polygon")
            .build()
    }

    async fn ok_handler(_req: Request<()>) -> Response<&'static str> {
        Response::new("premium")
    }

    #[tokio::test]
    async fn challenges_without_header() {
        let paywall = paywall();
        let err = paywall
            .handle_payment(Request::new(()), ok_handler)
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
        let Some(ErrorResponseHeader::PaymentRequired(header)) = err.header else {
            panic!("expected a challenge header");
        };
        let requirements = PaymentRequirements::from_header_value(&header).unwrap();
        assert_eq!(requirements.amount, AmountValue(10000));
        assert!(!requirements.is_expired_at(now_millis()));
        assert_eq!(paywall.counters.challenged(), 1);
        assert_eq!(paywall.counters.paid(), 0);
    }

    #[tokio::test]
    async fn empty_header_is_unpaid() {
        let paywall = paywall();
        let request = Request::builder()
            .header("X-PAYMENT", "   ")
            .body(())
            .unwrap();
        let err = paywall.handle_payment(request, ok_handler).await.unwrap_err();
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn runs_handler_and_echoes() {
        let paywall = paywall();
        let request = Request::builder()
            .header("X-Payment", "signed")
            .body(())
            .unwrap();
        let response = paywall.handle_payment(request, ok_handler).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(PAYMENT_HEADER).unwrap(), "signed");
        assert_eq!(*response.body(), "premium");
        assert_eq!(paywall.counters.total(), 1);
        assert_eq!(paywall.counters.paid(), 1);
    }

    #[tokio::test]
    async fn body_encoding_and_rejection() {
        let paywall = PayWall::builder()
            .amount(10000u64)
            .token("usdc")
            .recipient("merchant")
            .chain("local")
            .encoding(ChallengeEncoding::Body)
            .reject_payments(true)
            .build();
        let request = Request::builder()
            .header(PAYMENT_HEADER, "signed")
            .body(())
            .unwrap();
        let err = paywall.handle_payment(request, ok_handler).await.unwrap_err();

        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
        assert!(err.header.is_none());
        let body = serde_json::to_vec(&err.body).unwrap();
        assert_eq!(
            PaymentRequirements::from_body(&body).unwrap().chain,
            "local"
        );
    }

    #[test]
    fn negative_ttl_issues_expired_terms() {
        let paywall = PayWall::builder()
            .amount(1u64)
            .token("usdc")
            .recipient("merchant")
            .chain("local")
            .ttl_ms(-1000)
            .build();
        let now = now_millis();
        assert!(paywall.requirements_at(now).is_expired_at(now));
    }
}
