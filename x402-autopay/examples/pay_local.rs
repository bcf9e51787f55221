//! Pay the local test resource end to end.
//!
//! Starts a paywall on an ephemeral port, then pays for the directory's `test`
//! service twice: once successfully and once more as a blocked duplicate.
//!
//! ```sh
//! cargo run -p x402-autopay --example pay_local
//! ```

use x402_autopay::{
    agent::PaymentAgent, client::ChallengeClient, directory::EndpointDirectory,
    ledger::MemoryStorage, payable::Plan,
};
use x402_autopay_core::{
    concepts::PayerIdentity,
    transport::{PaymentAuthorization, PaymentRequirements},
};
use x402_autopay_paywall::{axum::test_resource_router, paywall::PayWall};

struct DemoWallet;

impl PayerIdentity for DemoWallet {
    type Error = x402_autopay_core::errors::Error;

    /// Signs nothing; the local paywall accepts any non-empty authorization.
    async fn authorize(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentAuthorization, Self::Error> {
        PaymentAuthorization::from_payload(&serde_json::json!({
            "scheme": "demo",
            "chain": requirements.chain,
            "to": requirements.recipient,
            "value": requirements.amount,
            "validBefore": requirements.expires_at,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paywall = PayWall::builder()
        .amount(10_000u64)
        .token("0x0000000000000000000000000000000000000000")
        .recipient("0x0000000000000000000000000000000000000000")
        .chain("local")
        .build();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move { axum::serve(listener, test_resource_router(paywall)).await });

    let mut directory = EndpointDirectory::builtin();
    directory.insert("test", EndpointDirectory::local_test_entry(&base_url));

    let agent = PaymentAgent::builder()
        .client(ChallengeClient::builder().payer(DemoWallet).build())
        .storage(MemoryStorage::new())
        .directory(directory)
        .build();

    let payable = agent
        .directory()
        .payable("test", Plan::Monthly)
        .ok_or("no test service in directory")?;

    for _ in 0..2 {
        let result = agent.pay(&payable).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    println!("Spent this month: {}", agent.current_month_spend());
    for notification in agent.notifications() {
        println!("{}", serde_json::to_string(&notification)?);
    }

    Ok(())
}
