//! Static directory of known paid services and token precisions.

use std::collections::{BTreeMap, HashMap};

use bon::Builder;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use x402_autopay_core::types::DEFAULT_TOKEN_DECIMALS;

use crate::payable::{EndpointSource, Payable, Plan};

/// USDC on Ethereum mainnet.
pub const USDC_ETHEREUM: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
/// Placeholder token used by the local and custom entries.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEndpoint {
    pub cost: Decimal,
    pub endpoint: String,
}

/// A known service.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub payment_endpoint: String,
    #[serde(default)]
    pub monthly_plan: Option<PlanEndpoint>,
    #[serde(default)]
    pub yearly_plan: Option<PlanEndpoint>,
    #[serde(default)]
    #[builder(into)]
    pub token: Option<String>,
    #[serde(default)]
    #[builder(into)]
    pub chain: Option<String>,
    #[serde(default)]
    #[builder(into)]
    pub recipient: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub metadata: Value,
}

impl DirectoryEntry {
    /// Endpoint for `plan`, falling back to the primary endpoint.
    pub fn endpoint_for(&self, plan: Plan) -> &str {
        let selected = match plan {
            Plan::Default => None,
            Plan::Monthly => self.monthly_plan.as_ref(),
            Plan::Yearly => self.yearly_plan.as_ref(),
        };
        selected
            .map(|p| p.endpoint.as_str())
            .unwrap_or(&self.payment_endpoint)
    }

    /// Price of `plan`, if the entry lists one.
    pub fn cost_for(&self, plan: Plan) -> Option<Decimal> {
        match plan {
            Plan::Default => None,
            Plan::Monthly => self.monthly_plan.as_ref().map(|p| p.cost),
            Plan::Yearly => self.yearly_plan.as_ref().map(|p| p.cost),
        }
    }
}

/// Endpoint chosen for a payable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub source: EndpointSource,
    /// Token from the payable, else from the directory entry.
    pub token: Option<String>,
}

/// Service keys to entries, plus the token precision table.
#[derive(Debug, Clone, Default)]
pub struct EndpointDirectory {
    entries: BTreeMap<String, DirectoryEntry>,
    token_decimals: HashMap<String, u32>,
}

impl EndpointDirectory {
    /// A directory with no services and the built-in token table.
    pub fn empty() -> Self {
        let mut directory = EndpointDirectory::default();
        for (token, decimals) in [
            (USDC_ETHEREUM, 6),
            // USDT
            ("0xdAC17F958D2ee523a2206206994597C13D831ec7", 6),
            // DAI
            ("0x6B175474E89094C44Da98b954EedeAC495271d0F", 18),
            // WETH
            ("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18),
            // USDC on Base
            ("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6),
            // USDC on Polygon
            ("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6),
        ] {
            directory.token_decimals.insert(token.to_lowercase(), decimals);
        }
        directory
    }

    /// The built-in services, including the local `test` entry.
    pub fn builtin() -> Self {
        let mut directory = Self::empty();

        let hosted = [
            (
                "midjourney",
                "Midjourney",
                "https://api.midjourney.com/v1/x402/subscribe",
                dec!(30.00),
                "https://api.midjourney.com/v1/x402/monthly",
            ),
            (
                "chatgpt",
                "ChatGPT Pro",
                "https://api.openai.com/v1/x402/subscribe",
                dec!(20.00),
                "https://api.openai.com/v1/x402/pro-monthly",
            ),
            (
                "claude",
                "Anthropic Claude",
                "https://api.anthropic.com/v1/x402/subscription",
                dec!(25.00),
                "https://api.anthropic.com/v1/x402/monthly",
            ),
            (
                "notion",
                "Notion",
                "https://api.notion.com/v1/x402/billing/pay",
                dec!(8.00),
                "https://api.notion.com/v1/x402/monthly",
            ),
            (
                "figma",
                "Figma",
                "https://api.figma.com/v1/x402/subscription/renew",
                dec!(12.00),
                "https://api.figma.com/v1/x402/monthly",
            ),
            (
                "netflix",
                "Netflix",
                "https://api.netflix.com/x402/subscription",
                dec!(15.49),
                "https://api.netflix.com/x402/premium",
            ),
        ];
        for (key, name, payment_endpoint, cost, monthly) in hosted {
            directory.insert(
                key,
                DirectoryEntry::builder()
                    .name(name)
                    .payment_endpoint(payment_endpoint)
                    .monthly_plan(PlanEndpoint {
                        cost,
                        endpoint: monthly.to_string(),
                    })
                    .token(USDC_ETHEREUM)
                    .chain("ethereum")
                    .build(),
            );
        }

        directory.insert(
            "custom",
            DirectoryEntry::builder()
                .name("Custom Service")
                .payment_endpoint("https://your-service.com/x402/subscribe")
                .monthly_plan(PlanEndpoint {
                    cost: dec!(9.99),
                    endpoint: "https://your-service.com/x402/monthly".to_string(),
                })
                .token(ZERO_ADDRESS)
                .chain("polygon")
                .build(),
        );

        directory.insert("test", Self::local_test_entry("http://localhost:3000"));
        directory
    }

    /// The local mock resource served at `<base_url>/api/x402/test`.
    pub fn local_test_entry(base_url: &str) -> DirectoryEntry {
        let endpoint = format!("{}/api/x402/test", base_url.trim_end_matches('/'));
        DirectoryEntry::builder()
            .name("Test Service (Local)")
            .payment_endpoint(endpoint.clone())
            .monthly_plan(PlanEndpoint {
                cost: dec!(0.01),
                endpoint,
            })
            .token(ZERO_ADDRESS)
            .chain("local")
            .recipient(ZERO_ADDRESS)
            .metadata(json!({
                "note": "Local mock x402 endpoint for development and integration tests."
            }))
            .build()
    }

    pub fn insert(
        &mut self,
        key: impl AsRef<str>,
        entry: DirectoryEntry,
    ) -> Option<DirectoryEntry> {
        self.entries.insert(key.as_ref().to_lowercase(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&DirectoryEntry> {
        self.entries.get(&key.to_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Register or override the precision of a token.
    pub fn with_token_decimals(mut self, token: &str, decimals: u32) -> Self {
        self.token_decimals.insert(token.to_lowercase(), decimals);
        self
    }

    /// Decimal precision of `token`; unknown or absent tokens assume 6.
    pub fn decimals_for(&self, token: Option<&str>) -> u32 {
        token
            .and_then(|t| self.token_decimals.get(&t.to_lowercase()))
            .copied()
            .unwrap_or(DEFAULT_TOKEN_DECIMALS)
    }

    /// A payable for a directory plan, priced from the entry.
    pub fn payable(&self, key: &str, plan: Plan) -> Option<Payable> {
        let entry = self.get(key)?;
        let cost = entry.cost_for(plan).or_else(|| entry.cost_for(Plan::Monthly))?;
        Some(
            Payable::builder()
                .name(entry.name.clone())
                .cost(cost)
                .service_key(key)
                .plan(plan)
                .build(),
        )
    }

    /// Pick the endpoint for `payable` from its sources in priority order.
    ///
    /// Unknown directory keys fall through to the next source.
    pub fn resolve(&self, payable: &Payable) -> Option<ResolvedEndpoint> {
        payable.endpoint_sources().into_iter().find_map(|source| {
            let (url, entry) = match &source {
                EndpointSource::Explicit(url) | EndpointSource::Metadata(url) => {
                    (url.clone(), None)
                }
                EndpointSource::DirectoryKey { key, plan } => {
                    let Some(entry) = self.get(key) else {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Unknown service key '{}'", key);
                        return None;
                    };
                    (entry.endpoint_for(*plan).to_string(), Some(entry))
                }
            };

            Some(ResolvedEndpoint {
                url,
                token: payable
                    .token
                    .clone()
                    .or_else(|| entry.and_then(|e| e.token.clone())),
                source,
            })
        })
    }
}
