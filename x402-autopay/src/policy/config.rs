use bon::Builder;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default lookback of the duplicate check: five minutes.
pub const DEFAULT_DUPLICATE_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Payment policy options, fixed for the lifetime of an agent.
///
/// Deserializes from the flat camelCase configuration object; missing keys take
/// their defaults.
///
/// ```
/// use rust_decimal_macros::dec;
/// use x402_autopay::policy::PolicyConfig;
///
/// let config: PolicyConfig =
///     serde_json::from_str(r#"{ "monthlyBudget": "20.00", "fraudDetection": false }"#).unwrap();
/// assert_eq!(config.monthly_budget, dec!(20.00));
/// assert!(!config.fraud_detection_enabled);
/// assert!(config.auto_approve);
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfig {
    /// Block repeats of the same endpoint and amount inside the duplicate window.
    #[serde(alias = "fraudDetection")]
    #[builder(default = true)]
    pub fraud_detection_enabled: bool,
    /// Most that may be spent successfully per calendar month.
    #[builder(default = dec!(1000.00))]
    pub monthly_budget: Decimal,
    /// Amounts strictly above this need approval when `alert_on_large_charge` is set.
    #[builder(default = dec!(100.00))]
    pub large_charge_threshold: Decimal,
    #[builder(default = true)]
    pub alert_on_large_charge: bool,
    /// When unset, every payment goes through the approval port.
    #[builder(default = true)]
    pub auto_approve: bool,
    #[builder(default = true)]
    pub send_reminders: bool,
    #[builder(default = DEFAULT_DUPLICATE_WINDOW_MS)]
    pub duplicate_window_ms: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn documented_defaults() {
        let config = PolicyConfig::default();
        assert!(config.fraud_detection_enabled);
        assert_eq!(config.monthly_budget, dec!(1000.00));
        assert_eq!(config.large_charge_threshold, dec!(100.00));
        assert!(config.alert_on_large_charge);
        assert!(config.auto_approve);
        assert!(config.send_reminders);
        assert_eq!(config.duplicate_window_ms, 300_000);

        let from_empty: PolicyConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(from_empty, config);
    }

    #[test]
    fn serializes_money_as_strings() {
        let json = serde_json::to_value(PolicyConfig::default()).unwrap();
        assert_eq!(json["monthlyBudget"], "1000.00");
        assert_eq!(json["fraudDetectionEnabled"], true);
    }
}
