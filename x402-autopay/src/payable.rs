use bon::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which of a directory entry's endpoints to pay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// The service's primary payment endpoint.
    #[default]
    Default,
    Monthly,
    Yearly,
}

/// Something the agent is asked to pay for.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payable {
    #[builder(into)]
    pub name: String,
    /// Price in human units, e.g. `9.99`.
    #[serde(alias = "costDecimal")]
    pub cost: Decimal,
    /// Literal endpoint; takes precedence over everything else.
    #[serde(default, alias = "paymentEndpoint")]
    #[builder(into)]
    pub endpoint: Option<String>,
    /// Key into the endpoint directory.
    #[serde(default)]
    #[builder(into)]
    pub service_key: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub plan: Plan,
    /// Token the price is quoted in; decides decimal precision.
    #[serde(default)]
    #[builder(into)]
    pub token: Option<String>,
    /// Free-form metadata. A non-empty string `endpoint` is the last endpoint fallback.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Where an endpoint may come from, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSource {
    Explicit(String),
    DirectoryKey { key: String, plan: Plan },
    Metadata(String),
}

impl Payable {
    /// Candidate endpoint sources, highest priority first.
    pub fn endpoint_sources(&self) -> Vec<EndpointSource> {
        let mut sources = Vec::with_capacity(3);

        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            sources.push(EndpointSource::Explicit(endpoint.to_string()));
        }
        if let Some(key) = self.service_key.as_deref().filter(|k| !k.trim().is_empty()) {
            sources.push(EndpointSource::DirectoryKey {
                key: key.to_string(),
                plan: self.plan,
            });
        }
        if let Some(endpoint) = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("endpoint"))
            .and_then(Value::as_str)
            .filter(|e| !e.trim().is_empty())
        {
            sources.push(EndpointSource::Metadata(endpoint.to_string()));
        }

        sources
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn priority_order() {
        let payable = Payable::builder()
            .name("Netflix")
            .cost(dec!(15.49))
            .endpoint("https://example.com/pay")
            .service_key("netflix")
            .plan(Plan::Monthly)
            .metadata(json!({ "endpoint": "https://example.com/meta" }))
            .build();

        assert_eq!(
            payable.endpoint_sources(),
            vec![
                EndpointSource::Explicit("https://example.com/pay".into()),
                EndpointSource::DirectoryKey {
                    key: "netflix".into(),
                    plan: Plan::Monthly
                },
                EndpointSource::Metadata("https://example.com/meta".into()),
            ]
        );
    }

    #[test]
    fn ignores_blank_and_non_string_values() {
        let payable: Payable = serde_json::from_value(json!({
            "name": "Custom",
            "cost": "1.00",
            "paymentEndpoint": "  ",
            "metadata": { "endpoint": 42 }
        }))
        .unwrap();
        assert!(payable.endpoint_sources().is_empty());
    }
}
