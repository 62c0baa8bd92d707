//! Ledger lifecycle and entry-consumption operations.
//!
//! The ledger owns Transaction mutation exclusively. Other services read
//! transactions to decide eligibility and request balance changes through
//! the operations here, never by writing fields directly.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::error::Result;

use super::error::LedgerError;
use super::store::{InsertOutcome, LedgerStore};
use super::transaction::{NewTransaction, NewTransactionKind, Transaction};

/// Identity collaborator: the user record holds the one-time trial flag,
/// so a trial purchase survives later cancellation or soft-deletion of
/// its transaction.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> Result<bool>;

    /// Atomically mark the user's trial as used. Returns `true` when this
    /// call set the flag, `false` when it was already set: the
    /// test-and-set that makes one-trial-per-user race-free.
    async fn mark_trial_used(&self, user_id: &str) -> Result<bool>;
}

/// Entitlement-verification collaborator consulted before a subscription
/// renewal is granted.
#[async_trait]
pub trait RenewalVerifier: Send + Sync {
    /// `Err` means the verifier itself was unreachable: an infrastructure
    /// error, distinct from an explicit [`RenewalVerdict::NotVerified`].
    async fn verify_renewal(&self, transaction: &Transaction) -> Result<RenewalVerdict>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalVerdict {
    Verified,
    NotVerified,
}

/// Result of [`LedgerManager::create_transaction`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub transaction: Transaction,
    /// `true` when the write was absorbed by an existing entry with the
    /// same gateway reference number (duplicate callback delivery).
    pub duplicate: bool,
}

pub struct LedgerManager<S: LedgerStore, U: UserDirectory> {
    store: S,
    users: U,
}

impl<S: LedgerStore, U: UserDirectory> LedgerManager<S, U> {
    #[must_use]
    pub fn new(store: S, users: U) -> Self {
        Self { store, users }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a ledger entry for a settled payment.
    ///
    /// Kind-specific required fields are validated up front; the
    /// one-trial-per-user invariant is enforced through the user
    /// directory's atomic test-and-set; duplicate gateway references are
    /// absorbed by returning the existing entry.
    pub async fn create_transaction(&self, new: NewTransaction) -> Result<CreateOutcome> {
        validate_new_transaction(&new)?;

        if !self.users.user_exists(&new.user_id).await? {
            return Err(LedgerError::UserNotFound {
                user_id: new.user_id,
            }
            .into());
        }

        let now = Utc::now();
        let is_trial = matches!(new.kind, NewTransactionKind::TrialLesson);
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id.clone(),
            kind: new.kind.into_kind(now),
            amount_cents: new.amount_cents,
            external_reference: new.external_reference,
            card_suffix: new.card_suffix,
            card_brand: new.card_brand,
            is_active: true,
            deactivated_reason: None,
            purchased_at: now,
            created_at: now,
            updated_at: now,
        };

        let transaction = match self.store.insert_transaction(&transaction).await? {
            InsertOutcome::Duplicate(existing) => {
                tracing::info!(
                    target: "pointe::ledger",
                    reference = %existing.external_reference,
                    transaction_id = %existing.id,
                    "duplicate gateway reference absorbed"
                );
                return Ok(CreateOutcome {
                    transaction: existing,
                    duplicate: true,
                });
            }
            InsertOutcome::Created(created) => created,
        };

        // The trial flag and the transaction must land together: the flag
        // is set only after the insert succeeded, and the insert is rolled
        // back if the flag cannot be set (or was already set by a
        // concurrent purchase).
        if is_trial {
            match self.users.mark_trial_used(&new.user_id).await {
                Ok(true) => {}
                Ok(false) => {
                    self.store.remove_transaction(&transaction.id).await?;
                    return Err(LedgerError::TrialAlreadyUsed {
                        user_id: new.user_id,
                    }
                    .into());
                }
                Err(err) => {
                    tracing::error!(
                        target: "pointe::ledger",
                        user_id = %new.user_id,
                        error = %err,
                        "trial flag write failed, rolling back transaction"
                    );
                    self.store.remove_transaction(&transaction.id).await?;
                    return Err(LedgerError::TrialFlagFailed {
                        user_id: new.user_id,
                    }
                    .into());
                }
            }
        }

        Ok(CreateOutcome {
            transaction,
            duplicate: false,
        })
    }

    /// Consume one subscription entry. The monthly limit is re-checked
    /// atomically inside the store operation.
    pub async fn use_subscription_entry(&self, id: &str) -> Result<Transaction> {
        self.store.consume_subscription_entry(id).await
    }

    /// Consume one punch-card entry; reaching zero deactivates the card
    /// in the same update.
    pub async fn use_punch_card_entry(&self, id: &str) -> Result<Transaction> {
        self.store.consume_punch_card_entry(id).await
    }

    /// Consume a trial lesson: the transaction admits exactly one seat,
    /// then deactivates.
    pub async fn use_trial_entry(&self, id: &str) -> Result<()> {
        self.store
            .set_active(id, false, Some("trial lesson used"))
            .await
    }

    /// Give back a subscription entry after a cancelled registration.
    pub async fn restore_subscription_entry(&self, id: &str) -> Result<Transaction> {
        self.store.restore_subscription_entry(id).await
    }

    /// Give back a punch-card entry, re-activating an exhausted card.
    pub async fn restore_punch_card_entry(&self, id: &str) -> Result<Transaction> {
        self.store.restore_punch_card_entry(id).await
    }

    /// Re-activate a trial transaction after its registration was
    /// cancelled.
    pub async fn restore_trial_entry(&self, id: &str) -> Result<()> {
        self.store.set_active(id, true, None).await
    }

    /// Administrative cancellation: an idempotent deactivation.
    pub async fn cancel_subscription(&self, id: &str) -> Result<()> {
        self.store.set_active(id, false, Some("cancelled")).await
    }

    /// Administrative renewal: advance the renewal date into the current
    /// month and reset usage.
    pub async fn renew_subscription(&self, id: &str) -> Result<()> {
        let transaction = self.store.get_transaction(id).await?.ok_or_else(|| {
            LedgerError::TransactionNotFound { id: id.to_string() }
        })?;
        let renewed_at = renewal_timestamp_in_month(transaction.purchased_at, Utc::now());
        self.store.record_renewal(id, renewed_at).await
    }

    /// Renewal sweep for one user's transactions.
    ///
    /// Every active subscription whose last renewal falls in a strictly
    /// earlier calendar month is checked against the verifier:
    /// - verified → renewal date advanced (preserving day-of-month and
    ///   time-of-day from the purchase, clamped to month length), usage
    ///   reset;
    /// - not verified → deactivated and excluded from the returned set;
    /// - verifier error → left active and unrenewed, to be retried on the
    ///   next call (fail-open on infrastructure errors only).
    ///
    /// Returns the user's active transactions after the sweep.
    pub async fn check_and_renew_subscriptions(
        &self,
        user_id: &str,
        verifier: &impl RenewalVerifier,
    ) -> Result<Vec<Transaction>> {
        let now = Utc::now();
        let mut active = Vec::new();

        for transaction in self.store.list_for_user(user_id).await? {
            if !transaction.is_active {
                continue;
            }
            let due = match &transaction.kind {
                super::transaction::TransactionKind::Subscription {
                    last_renewal_at, ..
                } => in_earlier_calendar_month(*last_renewal_at, now),
                _ => false,
            };
            if !due {
                active.push(transaction);
                continue;
            }

            match verifier.verify_renewal(&transaction).await {
                Ok(RenewalVerdict::Verified) => {
                    let renewed_at = renewal_timestamp_in_month(transaction.purchased_at, now);
                    self.store.record_renewal(&transaction.id, renewed_at).await?;
                    if let Some(updated) =
                        self.store.get_transaction(&transaction.id).await?
                    {
                        active.push(updated);
                    }
                }
                Ok(RenewalVerdict::NotVerified) => {
                    tracing::warn!(
                        target: "pointe::ledger",
                        transaction_id = %transaction.id,
                        user_id = %user_id,
                        "renewal payment not verified, deactivating subscription"
                    );
                    self.store
                        .set_active(
                            &transaction.id,
                            false,
                            Some("renewal payment not verified"),
                        )
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "pointe::ledger",
                        transaction_id = %transaction.id,
                        error = %err,
                        "renewal verification unavailable, leaving subscription unrenewed"
                    );
                    active.push(transaction);
                }
            }
        }

        Ok(active)
    }
}

fn validate_new_transaction(new: &NewTransaction) -> Result<()> {
    if new.user_id.is_empty() {
        return Err(LedgerError::InvalidField {
            field: "user_id".to_string(),
            reason: "must not be empty".to_string(),
        }
        .into());
    }
    if new.external_reference.is_empty() {
        return Err(LedgerError::InvalidField {
            field: "external_reference".to_string(),
            reason: "must not be empty".to_string(),
        }
        .into());
    }
    if new.amount_cents <= 0 {
        return Err(LedgerError::InvalidField {
            field: "amount_cents".to_string(),
            reason: "must be positive".to_string(),
        }
        .into());
    }
    match &new.kind {
        NewTransactionKind::Subscription { monthly_entries, .. } if *monthly_entries == 0 => {
            Err(LedgerError::InvalidField {
                field: "monthly_entries".to_string(),
                reason: "must be positive for subscriptions".to_string(),
            }
            .into())
        }
        NewTransactionKind::PunchCard { total_entries } if *total_entries == 0 => {
            Err(LedgerError::InvalidField {
                field: "total_entries".to_string(),
                reason: "must be positive for punch cards".to_string(),
            }
            .into())
        }
        _ => Ok(()),
    }
}

/// Whether `earlier` falls in a strictly earlier calendar month than
/// `later` (year/month comparison, not a 30-day window).
fn in_earlier_calendar_month(earlier: DateTime<Utc>, later: DateTime<Utc>) -> bool {
    (earlier.year(), earlier.month()) < (later.year(), later.month())
}

/// The renewal timestamp in `now`'s month, preserving the purchase's
/// day-of-month and time-of-day, with the day clamped to the target
/// month's length (a Jan 31 purchase renews on Feb 28).
fn renewal_timestamp_in_month(purchased_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let day = purchased_at.day().min(days_in_month(now.year(), now.month()));
    let date = NaiveDate::from_ymd_opt(now.year(), now.month(), day)
        .expect("clamped day is always valid");
    Utc.from_utc_datetime(&date.and_time(purchased_at.time()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("date has a predecessor")
        .day()
}
