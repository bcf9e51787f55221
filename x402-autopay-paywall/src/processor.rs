use http::{HeaderName, HeaderValue, Request, Response};
use x402_autopay_core::transport::{AuthorizationRef, PAYMENT_HEADER};

use crate::paywall::PayWall;

/// The state of a payment accepted by the paywall when accessing the resource handler.
///
/// This state is attached to the request extensions before running the resource handler,
/// and can be accessed within the handler to inspect the payment.
///
/// # Example
///
/// ```rust
/// use axum::{extract::Extension, Json};
/// use serde_json::{json, Value};
/// use x402_autopay_paywall::processor::PaymentState;
///
/// async fn example_handler(Extension(payment_state): Extension<PaymentState>) -> Json<Value> {
///     Json(json!({
///         "message": "You have accessed a protected resource!",
///         "authorization": payment_state.authorization,
///     }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PaymentState {
    /// Fingerprint of the received authorization.
    pub authorization: AuthorizationRef,
    /// Raw authorization to echo back, when the paywall echoes.
    pub(crate) echo: Option<String>,
}

/// Payment processing state before running the resource handler.
///
/// See [`PayWall`] for usage in the full payment processing flow.
pub struct RequestProcessor<'pw, Req> {
    pub paywall: &'pw PayWall,
    pub request: Request<Req>,
    pub payment_state: PaymentState,
}

impl<'pw, Req> RequestProcessor<'pw, Req> {
    /// Run the resource handler with the payment state attached to the request extensions.
    ///
    /// After running the handler, returns a [`ResponseProcessor`] for further processing.
    pub async fn run_handler<Fun, Fut, Res>(mut self, handler: Fun) -> ResponseProcessor<'pw, Res>
    where
        Fun: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Response<Res>>,
    {
        self.request
            .extensions_mut()
            .insert(self.payment_state.clone());

        let response = handler(self.request).await;
        ResponseProcessor {
            paywall: self.paywall,
            response,
            payment_state: self.payment_state,
        }
    }
}

/// Payment processing state after running the resource handler.
pub struct ResponseProcessor<'pw, Res> {
    pub paywall: &'pw PayWall,
    pub response: Response<Res>,
    pub payment_state: PaymentState,
}

impl<Res> ResponseProcessor<'_, Res> {
    /// Generate the final response, echoing the authorization in `x-payment` when configured.
    pub fn response(self) -> Response<Res> {
        let mut response = self.response;

        if let Some(echo) = &self.payment_state.echo {
            match HeaderValue::from_str(echo) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(HeaderName::from_static(PAYMENT_HEADER), value);
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Failed to encode x-payment echo header: {_err}; skipping");
                }
            }
        }

        response
    }
}
