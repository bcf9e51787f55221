//! The payment agent: resolve, check, pay, record.
//!
//! For details, see the [`PaymentAgent`] struct documentation.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use x402_autopay_core::{
    concepts::PayerIdentity,
    errors::ErrorKind,
    types::{AmountValue, EpochMillis},
};

use crate::{
    client::{ChallengeClient, ProtocolResult},
    clock::{Clock, SystemClock},
    directory::EndpointDirectory,
    errors::AgentError,
    ledger::{
        Ledger, Notification, NotificationSink, Storage, TransactionRecord, TransactionStatus,
    },
    payable::Payable,
    policy::{
        ApprovalPort, AutoApprove, PolicyConfig, PolicyDecision, PolicyEngine, PolicyRequest,
    },
};

const SUMMARY_LIMIT: usize = 200;

/// What `pay()` reports back. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub success: bool,
    /// Body of the paid resource on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn succeeded(data: Value) -> Self {
        AgentResult {
            success: true,
            data: Some(data),
            reason: None,
            error: None,
        }
    }

    pub fn failed(reason: ErrorKind, error: Option<String>) -> Self {
        AgentResult {
            success: false,
            data: None,
            reason: Some(reason),
            error,
        }
    }
}

/// Pays for [`Payable`]s through X402 under a payment policy, recording every attempt.
///
/// One `pay()` runs at a time per agent: the duplicate and budget checks, the
/// payment, and the ledger append happen under one async lock, so concurrent callers
/// cannot both pass a check that only one of them should pass.
///
/// Per call:
///
/// 1. Resolve the endpoint (explicit, directory key, metadata), else `no_endpoint`.
/// 2. Convert the price to token units at the token's precision, else `invalid_amount`.
/// 3. Run the [`PolicyEngine`]; a block returns its reason with no network call and
///    no transaction record.
/// 4. Fetch through the [`ChallengeClient`] with the converted amount as the cap.
/// 5. Record a `success` or `failed` transaction and return.
///
/// A ledger write lost after a successful payment still returns success, with a
/// security alert. Any other ledger failure becomes an alert and `unexpected_error`,
/// as does a panic in the payer or the approval port.
pub struct PaymentAgent<P, S> {
    client: ChallengeClient<P>,
    policy: PolicyEngine,
    ledger: Ledger<S>,
    directory: EndpointDirectory,
    clock: Arc<dyn Clock>,
    pay_lock: tokio::sync::Mutex<()>,
}

#[bon::bon]
impl<P: PayerIdentity, S: Storage> PaymentAgent<P, S> {
    #[builder]
    pub fn new(
        client: ChallengeClient<P>,
        storage: S,
        #[builder(default)] config: PolicyConfig,
        #[builder(default = Arc::new(AutoApprove))] approval: Arc<dyn ApprovalPort>,
        #[builder(default = EndpointDirectory::builtin())] directory: EndpointDirectory,
        #[builder(default = Arc::new(SystemClock))] clock: Arc<dyn Clock>,
    ) -> Self {
        PaymentAgent {
            client,
            policy: PolicyEngine::new(config, approval),
            ledger: Ledger::open(storage),
            directory,
            clock,
            pay_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Pay for `payable`.
    pub async fn pay(&self, payable: &Payable) -> AgentResult {
        self.pay_inner(payable, None).await
    }

    /// Pay for `payable`, giving up if `cancel` fires while the payer is authorizing.
    pub async fn pay_with_cancellation(
        &self,
        payable: &Payable,
        cancel: &CancellationToken,
    ) -> AgentResult {
        self.pay_inner(payable, Some(cancel)).await
    }

    async fn pay_inner(
        &self,
        payable: &Payable,
        cancel: Option<&CancellationToken>,
    ) -> AgentResult {
        let _guard = self.pay_lock.lock().await;

        // Panics in an injected payer or approval port become unexpected errors
        let error = match AssertUnwindSafe(self.try_pay(payable, cancel))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => return result,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(&*panic)),
        };

        #[cfg(feature = "tracing")]
        tracing::error!("Unexpected failure paying for '{}': {}", payable.name, error);

        self.ledger.notify(Notification::security_alert(
            "Agent error",
            json!({ "service": payable.name, "error": &error }),
            self.clock.now_ms(),
        ));
        AgentResult::failed(ErrorKind::UnexpectedError, Some(error))
    }

    async fn try_pay(
        &self,
        payable: &Payable,
        cancel: Option<&CancellationToken>,
    ) -> Result<AgentResult, AgentError> {
        let Some(resolved) = self.directory.resolve(payable) else {
            return Ok(AgentResult::failed(
                ErrorKind::NoEndpoint,
                Some(format!("No endpoint for {}", payable.name)),
            ));
        };

        let decimals = self.directory.decimals_for(resolved.token.as_deref());
        let conversion = match AmountValue::from_decimal(payable.cost, decimals) {
            Ok(conversion) => conversion,
            Err(err) => {
                return Ok(AgentResult::failed(
                    ErrorKind::InvalidAmount,
                    Some(err.to_string()),
                ));
            }
        };
        if conversion.rounded {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Price {} of '{}' rounded to {} units at {} decimals",
                payable.cost,
                payable.name,
                conversion.value,
                decimals
            );
        }

        let history = self.ledger.all();
        let decision = self.policy.check(
            &PolicyRequest {
                endpoint: &resolved.url,
                amount: payable.cost,
                payable,
            },
            &history,
            self.clock.now_ms(),
            &self.ledger,
        );
        if let PolicyDecision::Block(reason) = decision {
            return Ok(AgentResult::failed(reason, None));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Paying {} for '{}' at '{}' (max {} units)",
            payable.cost,
            payable.name,
            resolved.url,
            conversion.value
        );

        let fetched = match cancel {
            Some(token) => {
                self.client
                    .fetch_with_cancellation(&resolved.url, Some(conversion.value), token)
                    .await
            }
            None => self.client.fetch(&resolved.url, Some(conversion.value)).await,
        };

        let now_ms = self.clock.now_ms();
        match fetched {
            Ok(result) if result.ok => {
                let record = TransactionRecord::builder()
                    .service(payable.name.clone())
                    .amount(payable.cost)
                    .timestamp_ms(now_ms)
                    .endpoint(resolved.url.clone())
                    .status(TransactionStatus::Success)
                    .maybe_authorization_ref(result.authorization_ref.clone())
                    .http_status(result.status)
                    .response_summary(summarize_success(&result))
                    .build();

                // Money has moved; a lost write must not turn this into a failure
                if let Err(err) = self.ledger.record(record) {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to persist successful payment: {}", err);

                    self.ledger.notify(Notification::security_alert(
                        "Ledger write failed",
                        json!({ "service": payable.name, "error": err.to_string() }),
                        now_ms,
                    ));
                }

                Ok(AgentResult::succeeded(result.body))
            }
            Ok(result) => {
                let error = format!("non_ok_response: HTTP {}", result.status);

                #[cfg(feature = "tracing")]
                tracing::warn!("Payment failed ({}): {}", ErrorKind::PaymentRejected, error);

                self.ledger.record(failed_record(
                    payable,
                    &resolved.url,
                    now_ms,
                    ErrorKind::PaymentRejected,
                    Some(result.status),
                    format!("{error} {}", result.body),
                ))?;
                Ok(AgentResult::failed(ErrorKind::PaymentRejected, Some(error)))
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Payment failed ({}): {}", err.kind(), err);

                self.ledger.record(failed_record(
                    payable,
                    &resolved.url,
                    now_ms,
                    err.kind(),
                    err.status(),
                    err.to_string(),
                ))?;
                Ok(AgentResult::failed(err.kind(), Some(err.to_string())))
            }
        }
    }

    /// Add a `payment_reminder` notification, when reminders are enabled.
    ///
    /// Returns whether a reminder was written.
    pub fn send_reminder(&self, payable: &Payable) -> bool {
        if !self.policy.config().send_reminders {
            return false;
        }
        self.ledger.notify(Notification::payment_reminder(
            payable.name.clone(),
            payable.cost,
            self.clock.now_ms(),
        ));
        true
    }

    /// Every recorded transaction, oldest first.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.all()
    }

    /// Retained notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.ledger.notifications()
    }

    pub fn current_month_spend(&self) -> Decimal {
        self.ledger.current_month_spend(self.clock.now_ms())
    }

    pub fn config(&self) -> &PolicyConfig {
        self.policy.config()
    }

    pub fn directory(&self) -> &EndpointDirectory {
        &self.directory
    }

}

fn failed_record(
    payable: &Payable,
    endpoint: &str,
    now_ms: EpochMillis,
    kind: ErrorKind,
    http_status: Option<u16>,
    summary: String,
) -> TransactionRecord {
    TransactionRecord::builder()
        .service(payable.name.clone())
        .amount(payable.cost)
        .timestamp_ms(now_ms)
        .endpoint(endpoint)
        .status(TransactionStatus::Failed)
        .error(kind)
        .maybe_http_status(http_status)
        .response_summary(truncate(&summary))
        .build()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn summarize_success(result: &ProtocolResult) -> String {
    let status = result
        .body
        .get("status")
        .and_then(Value::as_str)
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();
    truncate(&format!("HTTP {}{}", result.status, status))
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
