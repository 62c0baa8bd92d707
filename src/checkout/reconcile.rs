//! Reconciliation of gateway callbacks into ledger entries.
//!
//! The gateway delivers payment events at least once; this engine turns
//! each into exactly one authoritative ledger write. Deduplication is NOT
//! done here, because metadata presence is ephemeral and callbacks may be
//! handled by independent processes. The ledger's uniqueness constraint
//! on the gateway reference number is the authority (see
//! [`crate::ledger::LedgerStore::insert_transaction`]).

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PointeError, Result};
use crate::ledger::manager::{LedgerManager, UserDirectory};
use crate::ledger::store::LedgerStore;
use crate::ledger::transaction::{NewTransaction, NewTransactionKind, ProductKind, Transaction};

use super::pending::{CheckoutStore, parse_checkout_reference};

/// How recently a transaction must have been created for status polling
/// to report "completed" once the pending metadata is gone.
const RECENT_TRANSACTION_WINDOW_MINUTES: i64 = 5;

/// Success-callback payload posted by the gateway.
///
/// Opaque beyond the fields consumed here; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    /// Our caller-chosen unique id, echoed back.
    #[serde(alias = "uniqueId")]
    pub unique_id: String,
    /// The gateway's reference number for the settled payment.
    #[serde(alias = "referenceNumber")]
    pub reference_number: String,
    /// Settled amount in currency units.
    pub amount: f64,
    /// Stored charge token, present when one was requested.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "cardSuffix")]
    pub card_suffix: Option<String>,
    #[serde(default, alias = "cardBrand")]
    pub card_brand: Option<String>,
    #[serde(default, alias = "customerEmail")]
    pub customer_email: Option<String>,
    #[serde(default, alias = "customerName")]
    pub customer_name: Option<String>,
}

impl CallbackPayload {
    fn amount_cents(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

/// Result of reconciling one callback.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub transaction: Transaction,
    /// The callback had been delivered before; the existing ledger entry
    /// was returned untouched.
    pub duplicate: bool,
    /// Pending metadata was lost and the purchase intent was recovered
    /// from the reference convention alone.
    pub degraded: bool,
}

/// Payment status derived for the polling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Pending metadata still present: the gateway has not called back.
    Pending,
    /// A matching ledger entry was created recently.
    Completed { transaction_id: String },
    /// No metadata and no recent entry; the intent is lost or never
    /// existed.
    Unknown,
}

/// Consumes gateway callbacks and produces ledger writes.
pub struct ReconciliationEngine<C, S, U>
where
    C: CheckoutStore,
    S: LedgerStore,
    U: UserDirectory,
{
    checkouts: C,
    ledger: LedgerManager<S, U>,
}

impl<C, S, U> ReconciliationEngine<C, S, U>
where
    C: CheckoutStore,
    S: LedgerStore,
    U: UserDirectory,
{
    #[must_use]
    pub fn new(checkouts: C, ledger: LedgerManager<S, U>) -> Self {
        Self { checkouts, ledger }
    }

    pub fn ledger(&self) -> &LedgerManager<S, U> {
        &self.ledger
    }

    /// Reconcile a success callback into a ledger entry.
    ///
    /// Order matters: metadata lookup happens before its deletion, and
    /// deletion is attempted best-effort even when the ledger write
    /// fails, so no pending record is ever left dangling.
    pub async fn process_callback(&self, payload: CallbackPayload) -> Result<CallbackOutcome> {
        let pending = self.checkouts.get(&payload.unique_id).await?;
        let degraded = pending.is_none();

        let new = match &pending {
            Some(pending) => {
                if pending.amount_cents != payload.amount_cents() {
                    tracing::warn!(
                        target: "pointe::checkout",
                        reference = %payload.unique_id,
                        expected = pending.amount_cents,
                        settled = payload.amount_cents(),
                        "settled amount differs from checkout amount"
                    );
                }
                let kind = match pending.kind {
                    ProductKind::Subscription => NewTransactionKind::Subscription {
                        monthly_entries: pending.monthly_entries.ok_or_else(|| {
                            PointeError::validation(
                                "pending subscription checkout is missing monthly entries",
                            )
                        })?,
                        charge_token: payload.token.clone(),
                    },
                    ProductKind::PunchCard => NewTransactionKind::PunchCard {
                        total_entries: pending.total_entries.ok_or_else(|| {
                            PointeError::validation(
                                "pending punch card checkout is missing total entries",
                            )
                        })?,
                    },
                    ProductKind::TrialLesson => NewTransactionKind::TrialLesson,
                };
                NewTransaction {
                    user_id: pending.user_id.clone(),
                    kind,
                    amount_cents: payload.amount_cents(),
                    external_reference: payload.reference_number.clone(),
                    card_suffix: payload.card_suffix.clone(),
                    card_brand: payload.card_brand.clone(),
                }
            }
            None => self.degraded_request(&payload)?,
        };

        let result = self.ledger.create_transaction(new).await;

        // Best-effort cleanup on every path, including the fallback one.
        if let Err(err) = self.checkouts.delete(&payload.unique_id).await {
            tracing::warn!(
                target: "pointe::checkout",
                reference = %payload.unique_id,
                error = %err,
                "failed to clear pending checkout"
            );
        }

        let outcome = result?;
        tracing::info!(
            target: "pointe::checkout",
            reference = %payload.unique_id,
            transaction_id = %outcome.transaction.id,
            duplicate = outcome.duplicate,
            degraded,
            "callback reconciled"
        );
        Ok(CallbackOutcome {
            transaction: outcome.transaction,
            duplicate: outcome.duplicate,
            degraded,
        })
    }

    /// Build a ledger write from the reference convention alone.
    ///
    /// Product kind and entry counts are unavailable on this path; the
    /// entry is recorded as a single-entry punch card so the payment is
    /// never dropped, and the degraded flag routes it to operator review.
    fn degraded_request(&self, payload: &CallbackPayload) -> Result<NewTransaction> {
        let (user_id, product_id) =
            parse_checkout_reference(&payload.unique_id).ok_or_else(|| {
                PointeError::validation(format!(
                    "no pending checkout for '{}' and the reference does not parse",
                    payload.unique_id
                ))
            })?;

        tracing::warn!(
            target: "pointe::checkout",
            reference = %payload.unique_id,
            user_id,
            product_id,
            "pending metadata lost, reconciling from reference convention"
        );

        Ok(NewTransaction {
            user_id: user_id.to_string(),
            kind: NewTransactionKind::PunchCard { total_entries: 1 },
            amount_cents: payload.amount_cents(),
            external_reference: payload.reference_number.clone(),
            card_suffix: payload.card_suffix.clone(),
            card_brand: payload.card_brand.clone(),
        })
    }

    /// Handle a failure callback: clear the pending metadata so polling
    /// stops reporting "pending". Always succeeds from the gateway's
    /// perspective.
    pub async fn process_failure(&self, unique_id: &str) {
        if let Err(err) = self.checkouts.delete(unique_id).await {
            tracing::warn!(
                target: "pointe::checkout",
                reference = %unique_id,
                error = %err,
                "failure-callback cleanup did not complete"
            );
        } else {
            tracing::info!(
                target: "pointe::checkout",
                reference = %unique_id,
                "payment failed, pending checkout cleared"
            );
        }
    }

    /// Derive payment status for the polling endpoint.
    pub async fn payment_status(&self, unique_id: &str) -> Result<PaymentStatus> {
        if self.checkouts.get(unique_id).await?.is_some() {
            return Ok(PaymentStatus::Pending);
        }

        let Some((user_id, _)) = parse_checkout_reference(unique_id) else {
            return Ok(PaymentStatus::Unknown);
        };

        let since = Utc::now() - Duration::minutes(RECENT_TRANSACTION_WINDOW_MINUTES);
        match self
            .ledger
            .store()
            .latest_for_user_since(user_id, since)
            .await?
        {
            Some(transaction) => Ok(PaymentStatus::Completed {
                transaction_id: transaction.id,
            }),
            None => Ok(PaymentStatus::Unknown),
        }
    }
}
