#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::net::TcpListener;
use x402_autopay::client::ChallengeClient;
use x402_autopay_core::{
    concepts::PayerIdentity,
    transport::{PaymentAuthorization, PaymentRequirements},
};
use x402_autopay_paywall::{
    axum::{TEST_RESOURCE_PATH, test_resource_router},
    paywall::{ChallengeEncoding, PayWall, PayWallCounters},
};

pub const TOKEN: &str = "0x0000000000000000000000000000000000000000";

/// A running local paywall.
pub struct TestResource {
    pub base_url: String,
    pub counters: PayWallCounters,
}

impl TestResource {
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TEST_RESOURCE_PATH)
    }
}

/// A paywall demanding `amount` units, with default knobs.
pub fn paywall(amount: u64) -> PayWall {
    PayWall::builder()
        .amount(amount)
        .token(TOKEN)
        .recipient(TOKEN)
        .chain("local")
        .build()
}

pub fn paywall_with(amount: u64, encoding: ChallengeEncoding, ttl_ms: i64) -> PayWall {
    PayWall::builder()
        .amount(amount)
        .token(TOKEN)
        .recipient(TOKEN)
        .chain("local")
        .encoding(encoding)
        .ttl_ms(ttl_ms)
        .build()
}

/// Serve the test resource behind `paywall` on an ephemeral port.
pub async fn spawn(paywall: PayWall) -> TestResource {
    let counters = paywall.counters.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, test_resource_router(paywall))
            .await
            .unwrap();
    });

    TestResource {
        base_url: format!("http://{addr}"),
        counters,
    }
}

/// Signs whatever it is asked to, counting calls.
#[derive(Debug, Clone, Default)]
pub struct SigningPayer {
    pub calls: Arc<AtomicUsize>,
}

impl SigningPayer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PayerIdentity for SigningPayer {
    type Error = PayerError;

    async fn authorize(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentAuthorization, Self::Error> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentAuthorization::new(format!(
            "signed-{}-{}-{n}",
            requirements.amount, requirements.recipient
        )))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("payer refused: {0}")]
pub struct PayerError(pub String);

/// Declines every payment.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefusingPayer;

impl PayerIdentity for RefusingPayer {
    type Error = PayerError;

    async fn authorize(
        &self,
        _requirements: &PaymentRequirements,
    ) -> Result<PaymentAuthorization, Self::Error> {
        Err(PayerError("user declined".into()))
    }
}

/// Never finishes authorizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StuckPayer;

impl PayerIdentity for StuckPayer {
    type Error = PayerError;

    async fn authorize(
        &self,
        _requirements: &PaymentRequirements,
    ) -> Result<PaymentAuthorization, Self::Error> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(PayerError("timed out".into()))
    }
}

pub fn client<P>(payer: P) -> ChallengeClient<P> {
    ChallengeClient::builder().payer(payer).build()
}
