//! # X402 Autopay
//!
//! Agent-mediated X402 micropayments for recurring services.
//!
//! A [`PaymentAgent`](agent::PaymentAgent) is asked to pay for a [`Payable`](payable::Payable).
//! It resolves where to pay, checks the payment against a [`PolicyConfig`](policy::PolicyConfig)
//! and the ledger history, settles through the X402 challenge/response exchange, and records
//! every attempt in an append-only ledger.
//!
//! ## Related Crates
//!
//! - **`x402-autopay-core`**: wire types shared with resources (requirements, authorizations,
//!   amounts) and the [`PayerIdentity`](x402_autopay_core::concepts::PayerIdentity) trait.
//! - **`x402-autopay-paywall`**: a framework-agnostic 402 paywall, used for the local test
//!   resource.
//!
//! ## Components
//!
//! - **[`client`]**: the paying HTTP client. At most two requests per exchange.
//! - **[`policy`]**: duplicate detection, monthly budget, large-charge and manual approval.
//! - **[`ledger`]**: transaction records, capped notifications and their storage.
//! - **[`directory`]**: known services, their plans and token precisions.
//! - **[`agent`]**: the orchestrator tying them together.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rust_decimal_macros::dec;
//! use x402_autopay::{
//!     agent::PaymentAgent,
//!     client::ChallengeClient,
//!     ledger::FileStorage,
//!     payable::Payable,
//!     policy::PolicyConfig,
//! };
//! use x402_autopay_core::{
//!     concepts::PayerIdentity,
//!     transport::{PaymentAuthorization, PaymentRequirements},
//! };
//!
//! struct Wallet;
//!
//! impl PayerIdentity for Wallet {
//!     type Error = std::io::Error;
//!
//!     async fn authorize(
//!         &self,
//!         requirements: &PaymentRequirements,
//!     ) -> Result<PaymentAuthorization, Self::Error> {
//!         Ok(PaymentAuthorization::new(format!("signed:{}", requirements.amount)))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = PaymentAgent::builder()
//!     .client(ChallengeClient::builder().payer(Wallet).build())
//!     .storage(FileStorage::new("./autopay-data")?)
//!     .config(PolicyConfig::builder().monthly_budget(dec!(50)).build())
//!     .build();
//!
//! let payable = Payable::builder()
//!     .name("Netflix")
//!     .cost(dec!(15.49))
//!     .service_key("netflix")
//!     .build();
//!
//! let result = agent.pay(&payable).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod clock;
pub mod directory;
pub mod errors;
pub mod ledger;
pub mod payable;
pub mod policy;
