//! # X402 Autopay Paywall
//!
//! The resource side of the X402 challenge/response exchange, framework-agnostic.
//!
//! [`PayWall`](paywall::PayWall) answers requests without an `x-payment` header with
//! `402 Payment Required` and freshly issued payment requirements, and lets requests
//! carrying a non-empty `x-payment` header through to the protected handler. It does not
//! verify or settle authorizations, so it is meant for local development and for
//! exercising paying clients in tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use x402_autopay_paywall::paywall::{ChallengeEncoding, PayWall};
//!
//! let paywall = PayWall::builder()
//!     .amount(10000u64)
//!     .token("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
//!     .recipient("0x0000000000000000000000000000000000000000")
//!     .chain("polygon")
//!     .encoding(ChallengeEncoding::Base64Header)
//!     .build();
//! ```
//!
//! ## Modules
//!
//! - [`paywall`]: The [`PayWall`](paywall::PayWall) struct and its challenge logic.
//! - [`processor`]: [`RequestProcessor`](processor::RequestProcessor) and
//!   [`PaymentState`](processor::PaymentState).
//! - [`errors`]: The 402 [`ErrorResponse`](errors::ErrorResponse).
//! - `axum` (feature `axum`): middleware and a ready-made test resource router.
//!
//! ## Test knobs
//!
//! - `encoding`: requirements in a JSON header, a base64 JSON header, or the body.
//! - `ttl_ms`: a negative TTL issues requirements that are already expired.
//! - `reject_payments`: answer paid requests with another 402.

pub mod errors;
pub mod paywall;
pub mod processor;

#[cfg(feature = "axum")]
pub mod axum;
