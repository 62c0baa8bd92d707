//! Recurring-billing job.
//!
//! Scans active subscriptions, charges the ones that are due, and
//! deactivates the ones whose charge fails. Designed to run as a single
//! periodic, non-overlapping invocation: the run itself is serialized
//! behind an async mutex, because a concurrent second run over the same
//! transaction set risks double charges while a success-update is still
//! in flight.

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::checkout::gateway::GatewayClient;
use crate::error::Result;
use crate::ledger::store::LedgerStore;
use crate::ledger::transaction::Transaction;

/// How a billing run behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and log every decision without charging.
    pub dry_run: bool,
    /// Ignore the days-since-payment gate and charge everything eligible.
    pub force: bool,
}

impl RunOptions {
    /// Read the `POINTE_BILLING_DRY_RUN` / `POINTE_BILLING_FORCE` toggles.
    #[must_use]
    pub fn from_env() -> Self {
        let flag = |key: &str| {
            std::env::var(key)
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false)
        };
        Self {
            dry_run: flag("POINTE_BILLING_DRY_RUN"),
            force: flag("POINTE_BILLING_FORCE"),
        }
    }
}

/// Structured summary of one billing run.
///
/// `processed` counts subscriptions that reached the charge step; on a
/// dry run nothing is charged, so `successful` and `failed` stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped_not_due: usize,
    pub skipped_no_token: usize,
}

/// The periodic recurring-billing job.
pub struct BillingScheduler<S: LedgerStore, G: GatewayClient> {
    store: S,
    gateway: G,
    charge_after_days: i64,
    run_lock: Mutex<()>,
}

impl<S: LedgerStore, G: GatewayClient> BillingScheduler<S, G> {
    #[must_use]
    pub fn new(store: S, gateway: G, charge_after_days: i64) -> Self {
        Self {
            store,
            gateway,
            charge_after_days,
            run_lock: Mutex::new(()),
        }
    }

    /// Execute one billing run.
    ///
    /// Holding the run lock for the whole sweep keeps invocations
    /// single-flight within this process; deployment keeps the schedule
    /// itself non-overlapping across processes.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let _guard = self.run_lock.lock().await;

        let subscriptions = self.store.list_active_subscriptions().await?;
        let mut summary = RunSummary {
            total: subscriptions.len(),
            ..RunSummary::default()
        };

        tracing::info!(
            target: "pointe::billing",
            total = summary.total,
            dry_run = options.dry_run,
            force = options.force,
            "billing run started"
        );

        for transaction in subscriptions {
            self.process_subscription(&transaction, options, &mut summary)
                .await;
        }

        tracing::info!(
            target: "pointe::billing",
            total = summary.total,
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            skipped_not_due = summary.skipped_not_due,
            skipped_no_token = summary.skipped_no_token,
            "billing run finished"
        );
        Ok(summary)
    }

    async fn process_subscription(
        &self,
        transaction: &Transaction,
        options: RunOptions,
        summary: &mut RunSummary,
    ) {
        let days_since_payment = (Utc::now() - transaction.last_charged_at()).num_days();

        if days_since_payment < self.charge_after_days && !options.force {
            summary.skipped_not_due += 1;
            return;
        }

        let Some(token) = transaction.charge_token() else {
            // Cannot auto-renew; left active for manual follow-up rather
            // than punishing the member for a missing token.
            tracing::warn!(
                target: "pointe::billing",
                transaction_id = %transaction.id,
                user_id = %transaction.user_id,
                "subscription due but has no stored charge token"
            );
            summary.skipped_no_token += 1;
            return;
        };

        if options.dry_run {
            tracing::info!(
                target: "pointe::billing",
                transaction_id = %transaction.id,
                amount_cents = transaction.amount_cents,
                days_since_payment,
                "dry run: would charge"
            );
            summary.processed += 1;
            return;
        }

        summary.processed += 1;
        let reference = charge_reference(&transaction.user_id);
        match self
            .gateway
            .charge_token(token, transaction.amount_cents, &reference)
            .await
        {
            Ok(receipt) => {
                let result = self
                    .store
                    .record_charge(&transaction.id, Utc::now(), &receipt.reference_number)
                    .await;
                match result {
                    Ok(()) => {
                        summary.successful += 1;
                        tracing::info!(
                            target: "pointe::billing",
                            transaction_id = %transaction.id,
                            reference_number = %receipt.reference_number,
                            "subscription charged"
                        );
                    }
                    Err(err) => {
                        // The member was charged but the ledger update
                        // failed; surfaced loudly for manual repair.
                        summary.failed += 1;
                        tracing::error!(
                            target: "pointe::billing",
                            transaction_id = %transaction.id,
                            reference_number = %receipt.reference_number,
                            error = %err,
                            "charge succeeded but the ledger update failed"
                        );
                    }
                }
            }
            Err(err) => {
                // No retry within the run: repeated attempts against a
                // possibly-invalid token are worse than a deactivation
                // the front desk can follow up on.
                summary.failed += 1;
                let reason = format!("recurring charge failed: {err}");
                tracing::error!(
                    target: "pointe::billing",
                    transaction_id = %transaction.id,
                    user_id = %transaction.user_id,
                    error = %err,
                    "recurring charge failed, deactivating subscription"
                );
                if let Err(update_err) = self
                    .store
                    .set_active(&transaction.id, false, Some(reason.as_str()))
                    .await
                {
                    tracing::error!(
                        target: "pointe::billing",
                        transaction_id = %transaction.id,
                        error = %update_err,
                        "failed to deactivate subscription after charge failure"
                    );
                }
            }
        }
    }
}

fn charge_reference(user_id: &str) -> String {
    format!("{user_id}-renewal-{}", Uuid::new_v4())
}
