//! Recurring-billing job entry point.
//!
//! Invoked once per schedule tick (a daily cron in production, never
//! overlapping). Environment toggles:
//!
//! - `POINTE_BILLING_DRY_RUN`: compute and log without charging
//! - `POINTE_BILLING_FORCE`: ignore the days-since-payment gate
//!
//! This binary wires the in-memory ledger store; a deployment binary
//! swaps in its persistent `LedgerStore` implementation and is otherwise
//! identical.

use pointe::billing::{BillingScheduler, RunOptions};
use pointe::checkout::{LiveGatewayClient, LiveGatewayConfig};
use pointe::ledger::InMemoryLedgerStore;
use pointe::{Config, Result};
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> Result<()> {
    pointe::init_tracing();

    let config = Config::from_env();
    let options = RunOptions::from_env();

    let gateway = LiveGatewayClient::new(
        config.gateway.api_key.expose_secret().to_string(),
        LiveGatewayConfig {
            base_url: config.gateway.base_url.clone(),
            timeout_seconds: config.gateway.timeout_seconds,
        },
    )?;

    let store = InMemoryLedgerStore::new();
    let scheduler = BillingScheduler::new(store, gateway, config.billing.charge_after_days);

    let summary = scheduler.run(options).await?;

    tracing::info!(
        total = summary.total,
        processed = summary.processed,
        successful = summary.successful,
        failed = summary.failed,
        skipped_not_due = summary.skipped_not_due,
        skipped_no_token = summary.skipped_no_token,
        "billing run complete"
    );
    Ok(())
}
