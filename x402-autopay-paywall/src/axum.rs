//! Axum integration for [`PayWall`].

use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};

use crate::{
    paywall::{PayWall, now_millis},
    processor::PaymentState,
};

/// Path served by [`test_resource_router`].
pub const TEST_RESOURCE_PATH: &str = "/api/x402/test";

const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Middleware guarding the wrapped routes with the paywall in state.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/premium", get(handler))
///     .layer(from_fn_with_state(paywall, paywall_middleware));
/// ```
pub async fn paywall_middleware(
    State(paywall): State<PayWall>,
    req: Request,
    next: Next,
) -> Response {
    paywall
        .handle_payment(req, |req| next.run(req))
        .await
        .unwrap_or_else(|err| err.into_response())
}

/// Local 402 resource for development and integration tests.
///
/// Serves `GET /api/x402/test` behind `paywall`.
pub fn test_resource_router(paywall: PayWall) -> Router {
    Router::new().route(
        TEST_RESOURCE_PATH,
        get(test_resource).layer(from_fn_with_state(paywall, paywall_middleware)),
    )
}

async fn test_resource(Extension(payment): Extension<PaymentState>) -> Json<Value> {
    #[cfg(feature = "tracing")]
    tracing::info!("Serving test resource for '{}'", payment.authorization);

    Json(json!({
        "success": true,
        "message": "Payment accepted. Here is your premium content.",
        "subscription": "Test Service",
        "status": "active",
        "authorization": payment.authorization,
        "validUntil": now_millis().saturating_add(THIRTY_DAYS_MS),
    }))
}
