use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// State of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

impl ApprovalStatus {
    /// Only an explicit approval lets a payment through.
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    /// The amount is above the large-charge threshold.
    LargeCharge,
    /// Auto-approval is disabled.
    ManualApproval,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub service: String,
    pub amount: Decimal,
    pub endpoint: String,
    pub reason: ApprovalReason,
}

/// Decides approval requests raised by the policy engine.
///
/// Called synchronously; an implementation that waits on a person or a remote
/// policy service should bound the wait itself and answer `Pending` on timeout.
pub trait ApprovalPort: Send + Sync {
    fn request_approval(&self, request: &ApprovalRequest) -> ApprovalStatus;
}

impl<F> ApprovalPort for F
where
    F: Fn(&ApprovalRequest) -> ApprovalStatus + Send + Sync,
{
    fn request_approval(&self, request: &ApprovalRequest) -> ApprovalStatus {
        self(request)
    }
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalPort for AutoApprove {
    fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalStatus {
        ApprovalStatus::Approved
    }
}

/// Denies everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl ApprovalPort for DenyAll {
    fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalStatus {
        ApprovalStatus::Denied
    }
}
