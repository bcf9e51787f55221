//! Paying HTTP client for X402 resources.
//!
//! [`ChallengeClient`] issues one plain request. A `402 Payment Required` answer is
//! decoded into [`PaymentRequirements`], checked, turned into a [`PaymentAuthorization`]
//! by the configured [`PayerIdentity`], and the request is reissued exactly once with the
//! authorization in the `x-payment` header. It never sends more than two requests.

use std::sync::Arc;

use bon::Builder;
use http::{HeaderMap, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;
use x402_autopay_core::{
    concepts::PayerIdentity,
    transport::{
        AuthorizationRef, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER, PaymentAuthorization,
        PaymentRequirements,
    },
    types::AmountValue,
};

use crate::{
    clock::{Clock, SystemClock},
    errors::ProtocolError,
};

/// Normalized outcome of [`ChallengeClient::fetch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolResult {
    /// Whether the final status was 2xx.
    pub ok: bool,
    pub status: u16,
    /// JSON body, or the body text as a JSON string for other content types.
    pub body: Value,
    /// Whether an authorization was attached to the final request.
    pub paid: bool,
    /// Fingerprint of the authorization that was used, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_ref: Option<AuthorizationRef>,
    /// Whether the resource echoed an `x-payment` header back.
    pub authorization_echoed: bool,
}

/// X402 client that pays for resources through a [`PayerIdentity`].
#[derive(Builder, Debug, Clone)]
pub struct ChallengeClient<P> {
    /// Produces authorizations for offered requirements.
    pub payer: P,
    #[builder(default)]
    pub http: reqwest::Client,
    #[builder(default = Arc::new(SystemClock))]
    pub clock: Arc<dyn Clock>,
}

impl<P: PayerIdentity> ChallengeClient<P> {
    /// Request `endpoint`, paying once if challenged.
    ///
    /// `max_authorized` caps the amount (in token units) the client agrees to pay.
    /// A non-402 first response is returned as-is, whatever its status.
    pub async fn fetch(
        &self,
        endpoint: &str,
        max_authorized: Option<AmountValue>,
    ) -> Result<ProtocolResult, ProtocolError> {
        self.fetch_inner(endpoint, max_authorized, None).await
    }

    /// Like [`fetch`](Self::fetch), abandoning the exchange if `cancel` fires while the
    /// payer is authorizing. A cancelled exchange never sends the paid retry.
    pub async fn fetch_with_cancellation(
        &self,
        endpoint: &str,
        max_authorized: Option<AmountValue>,
        cancel: &CancellationToken,
    ) -> Result<ProtocolResult, ProtocolError> {
        self.fetch_inner(endpoint, max_authorized, Some(cancel))
            .await
    }

    async fn fetch_inner(
        &self,
        endpoint: &str,
        max_authorized: Option<AmountValue>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ProtocolResult, ProtocolError> {
        let url = Url::parse(endpoint)?;

        let response = self.send(url.clone(), None).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return read_result(response, None).await;
        }

        let challenge_header = response
            .headers()
            .get(PAYMENT_REQUIRED_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        let challenge_body = response.bytes().await?;

        let requirements =
            PaymentRequirements::from_challenge(challenge_header.as_deref(), &challenge_body)
                .map_err(ProtocolError::MalformedChallenge)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Payment required by '{}': amount={}, token='{}', chain='{}', expiresAt={}",
            url,
            requirements.amount,
            requirements.token,
            requirements.chain,
            requirements.expires_at
        );

        requirements
            .validate(self.clock.now_ms(), max_authorized)
            .inspect_err(|_err| {
                #[cfg(feature = "tracing")]
                tracing::warn!("Refusing payment requirements from '{}': {}", url, _err);
            })?;

        let authorization = self.authorize(&requirements, cancel).await?;
        let authorization_ref = authorization.reference();

        #[cfg(feature = "tracing")]
        tracing::debug!("Retrying '{}' with authorization '{}'", url, authorization_ref);

        let response = self.send(url, Some(&authorization)).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();

            #[cfg(feature = "tracing")]
            tracing::warn!("Paid request rejected with status {}", status);

            return Err(ProtocolError::PaymentRejected {
                status: status.as_u16(),
                message: if status == StatusCode::PAYMENT_REQUIRED {
                    format!("payment required again: {message}")
                } else {
                    format!("non_ok_response: {message}")
                },
            });
        }

        read_result(response, Some(authorization_ref)).await
    }

    async fn authorize(
        &self,
        requirements: &PaymentRequirements,
        cancel: Option<&CancellationToken>,
    ) -> Result<PaymentAuthorization, ProtocolError> {
        let authorized = match cancel {
            Some(token) => token
                .run_until_cancelled(self.payer.authorize(requirements))
                .await
                .ok_or(ProtocolError::Cancelled)?,
            None => self.payer.authorize(requirements).await,
        };

        let authorization =
            authorized.map_err(|err| ProtocolError::AuthorizationDenied(err.to_string()))?;

        if authorization.is_empty() {
            return Err(ProtocolError::AuthorizationDenied(
                "payer returned an empty authorization".to_string(),
            ));
        }

        Ok(authorization)
    }

    async fn send(
        &self,
        url: Url,
        authorization: Option<&PaymentAuthorization>,
    ) -> Result<reqwest::Response, ProtocolError> {
        let mut request = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json");
        if let Some(authorization) = authorization {
            request = request.header(PAYMENT_HEADER, authorization.header_value());
        }
        Ok(request.send().await?)
    }
}

async fn read_result(
    response: reqwest::Response,
    authorization_ref: Option<AuthorizationRef>,
) -> Result<ProtocolResult, ProtocolError> {
    let status = response.status();
    let authorization_echoed = response.headers().contains_key(PAYMENT_HEADER);
    let is_json = is_json(response.headers());
    let bytes = response.bytes().await?;

    let body = if bytes.is_empty() {
        Value::Null
    } else if is_json {
        serde_json::from_slice(&bytes).unwrap_or_else(|_err| {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to parse JSON response body: {_err}");
            Value::Null
        })
    } else {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Final response status {} (paid: {})",
        status,
        authorization_ref.is_some()
    );

    Ok(ProtocolResult {
        ok: status.is_success(),
        status: status.as_u16(),
        body,
        paid: authorization_ref.is_some(),
        authorization_ref,
        authorization_echoed,
    })
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
}
