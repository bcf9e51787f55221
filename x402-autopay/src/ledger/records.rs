use bon::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use x402_autopay_core::{errors::ErrorKind, transport::AuthorizationRef, types::EpochMillis};

use crate::policy::ApprovalStatus;

/// Outcome of an attempted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// One attempted payment. Never mutated once recorded.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[builder(into, default = new_id("tx"))]
    pub id: String,
    /// Display name of what was paid for.
    #[builder(into)]
    pub service: String,
    /// Price in human units.
    pub amount: Decimal,
    pub timestamp_ms: EpochMillis,
    #[builder(into)]
    pub endpoint: String,
    pub status: TransactionStatus,
    /// Fingerprint of the authorization used, never the authorization itself.
    #[serde(default)]
    pub authorization_ref: Option<AuthorizationRef>,
    /// HTTP status of the final response, if any.
    #[serde(default)]
    pub http_status: Option<u16>,
    /// Reason code for failed records.
    #[serde(default)]
    pub error: Option<ErrorKind>,
    /// Short description of the response or failure.
    #[serde(default)]
    #[builder(into)]
    pub response_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequest,
    SecurityAlert,
    PaymentReminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Advisory record. Informational only, never consulted by policy checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp_ms: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub details: Value,
}

impl Notification {
    fn new(kind: NotificationKind, timestamp_ms: EpochMillis) -> Self {
        Notification {
            id: new_id("ntf"),
            kind,
            timestamp_ms,
            title: None,
            service: None,
            amount: None,
            severity: None,
            status: None,
            details: Value::Null,
        }
    }

    pub fn approval_request(
        service: impl Into<String>,
        amount: Decimal,
        status: ApprovalStatus,
        details: Value,
        timestamp_ms: EpochMillis,
    ) -> Self {
        Notification {
            service: Some(service.into()),
            amount: Some(amount),
            status: Some(status),
            details,
            ..Self::new(NotificationKind::ApprovalRequest, timestamp_ms)
        }
    }

    pub fn security_alert(
        title: impl Into<String>,
        details: Value,
        timestamp_ms: EpochMillis,
    ) -> Self {
        Notification {
            title: Some(title.into()),
            severity: Some(Severity::High),
            details,
            ..Self::new(NotificationKind::SecurityAlert, timestamp_ms)
        }
    }

    pub fn payment_reminder(
        service: impl Into<String>,
        amount: Decimal,
        timestamp_ms: EpochMillis,
    ) -> Self {
        Notification {
            service: Some(service.into()),
            amount: Some(amount),
            ..Self::new(NotificationKind::PaymentReminder, timestamp_ms)
        }
    }
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
