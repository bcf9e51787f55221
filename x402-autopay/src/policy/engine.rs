use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use x402_autopay_core::{errors::ErrorKind, types::EpochMillis};

use crate::{
    ledger::{Notification, NotificationSink, TransactionRecord, month_spend, recent_matching},
    payable::Payable,
    policy::{ApprovalPort, ApprovalReason, ApprovalRequest, ApprovalStatus, PolicyConfig},
};

/// Verdict of [`PolicyEngine::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Pass,
    Block(ErrorKind),
}

impl PolicyDecision {
    pub fn passed(&self) -> bool {
        matches!(self, PolicyDecision::Pass)
    }

    pub fn reason(&self) -> Option<ErrorKind> {
        match self {
            PolicyDecision::Pass => None,
            PolicyDecision::Block(kind) => Some(*kind),
        }
    }
}

/// A payment about to be made.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    pub endpoint: &'a str,
    pub amount: Decimal,
    pub payable: &'a Payable,
}

/// Decides whether a payment may proceed.
///
/// Checks run in order and stop at the first block:
///
/// 1. duplicate detection (when enabled),
/// 2. the monthly budget,
/// 3. large-charge approval (when enabled),
/// 4. manual approval (when auto-approval is off).
///
/// Checks only read the history. Their one side effect is notifications.
#[derive(Clone)]
pub struct PolicyEngine {
    config: PolicyConfig,
    approval: Arc<dyn ApprovalPort>,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig, approval: Arc<dyn ApprovalPort>) -> Self {
        PolicyEngine { config, approval }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn check(
        &self,
        request: &PolicyRequest<'_>,
        history: &[TransactionRecord],
        now_ms: EpochMillis,
        sink: &dyn NotificationSink,
    ) -> PolicyDecision {
        let decision = self.run_checks(request, history, now_ms, sink);

        #[cfg(feature = "tracing")]
        if let PolicyDecision::Block(reason) = decision {
            tracing::info!(
                "Payment of {} to '{}' blocked: {}",
                request.amount,
                request.endpoint,
                reason
            );
        }

        decision
    }

    fn run_checks(
        &self,
        request: &PolicyRequest<'_>,
        history: &[TransactionRecord],
        now_ms: EpochMillis,
        sink: &dyn NotificationSink,
    ) -> PolicyDecision {
        let service = request.payable.name.as_str();

        if self.config.fraud_detection_enabled
            && recent_matching(
                history,
                request.endpoint,
                request.amount,
                self.config.duplicate_window_ms,
                now_ms,
            )
            .next()
            .is_some()
        {
            sink.notify(Notification::security_alert(
                "Fraudulent charge blocked",
                json!({
                    "service": service,
                    "endpoint": request.endpoint,
                    "amount": request.amount,
                }),
                now_ms,
            ));
            return PolicyDecision::Block(ErrorKind::FraudDetected);
        }

        let current_spend = month_spend(history, now_ms);
        if current_spend + request.amount > self.config.monthly_budget {
            sink.notify(Notification::security_alert(
                "Budget limit reached",
                json!({
                    "service": service,
                    "amount": request.amount,
                    "currentSpend": current_spend,
                    "monthlyBudget": self.config.monthly_budget,
                }),
                now_ms,
            ));
            return PolicyDecision::Block(ErrorKind::BudgetExceeded);
        }

        if self.config.alert_on_large_charge
            && request.amount > self.config.large_charge_threshold
            && !self.approve(request, ApprovalReason::LargeCharge, now_ms, sink)
        {
            return PolicyDecision::Block(ErrorKind::ApprovalDenied);
        }

        if !self.config.auto_approve
            && !self.approve(request, ApprovalReason::ManualApproval, now_ms, sink)
        {
            return PolicyDecision::Block(ErrorKind::ApprovalDenied);
        }

        PolicyDecision::Pass
    }

    /// Raise one `approval_request` notification and ask the approval port.
    fn approve(
        &self,
        request: &PolicyRequest<'_>,
        reason: ApprovalReason,
        now_ms: EpochMillis,
        sink: &dyn NotificationSink,
    ) -> bool {
        sink.notify(Notification::approval_request(
            request.payable.name.clone(),
            request.amount,
            ApprovalStatus::Pending,
            json!({ "endpoint": request.endpoint, "reason": reason }),
            now_ms,
        ));

        let status = self.approval.request_approval(&ApprovalRequest {
            service: request.payable.name.clone(),
            amount: request.amount,
            endpoint: request.endpoint.to_string(),
            reason,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Approval for '{}' ({:?}): {:?}",
            request.payable.name,
            reason,
            status
        );

        status.is_approved()
    }
}
