//! Storage seam for the ledger.
//!
//! Implement this trait to persist transactions to your database. Entry
//! balances are mutated through conditional, atomic operations at the
//! store, never read-modify-write at the caller, so concurrent
//! registrations cannot lose updates. An in-memory implementation lives
//! in [`super::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::transaction::Transaction;

/// Result of inserting a transaction under the external-reference
/// uniqueness constraint.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The transaction was written.
    Created(Transaction),
    /// An entry with the same gateway reference number already exists;
    /// the existing entry is returned untouched. This is how duplicate
    /// gateway callbacks are absorbed.
    Duplicate(Transaction),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a transaction, enforcing uniqueness on the gateway
    /// reference number. A second write carrying an already-known
    /// reference returns [`InsertOutcome::Duplicate`] with the existing
    /// entry instead of creating another.
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<InsertOutcome>;

    /// Remove a transaction. Only used as compensating cleanup when a
    /// coupled write (the trial flag) fails after the insert.
    async fn remove_transaction(&self, id: &str) -> Result<()>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// All transactions owned by the user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>>;

    /// All active subscription transactions, across users. The billing
    /// scheduler's working set.
    async fn list_active_subscriptions(&self) -> Result<Vec<Transaction>>;

    /// The user's most recent transaction created at or after `since`.
    /// Status polling uses this to distinguish "completed" from
    /// "unknown" once the pending metadata is gone.
    async fn latest_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Transaction>>;

    /// Set the lifecycle flag, recording a reason when deactivating.
    async fn set_active(&self, id: &str, active: bool, reason: Option<&str>) -> Result<()>;

    /// Atomically consume one subscription entry.
    ///
    /// The limit is re-checked inside the operation: fails with a
    /// conflict when `entries_used_this_month` already equals
    /// `monthly_entries`. Returns the updated transaction.
    async fn consume_subscription_entry(&self, id: &str) -> Result<Transaction>;

    /// Atomically restore one subscription entry (registration
    /// cancellation). Clamps at zero used entries.
    async fn restore_subscription_entry(&self, id: &str) -> Result<Transaction>;

    /// Atomically consume one punch-card entry.
    ///
    /// Fails with a conflict when no entries remain. When the decrement
    /// reaches 0 the transaction is deactivated in the same update.
    async fn consume_punch_card_entry(&self, id: &str) -> Result<Transaction>;

    /// Atomically restore one punch-card entry, re-activating a card
    /// that regains balance. Fails with a conflict when the card is
    /// already at its immutable total.
    async fn restore_punch_card_entry(&self, id: &str) -> Result<Transaction>;

    /// Record a successful recurring charge: `last_payment_at = paid_at`,
    /// usage reset to 0, and the gateway reference replaced with the new
    /// charge's reference number.
    async fn record_charge(
        &self,
        id: &str,
        paid_at: DateTime<Utc>,
        new_reference: &str,
    ) -> Result<()>;

    /// Record a verified renewal: advance `last_renewal_at` and reset
    /// usage to 0.
    async fn record_renewal(&self, id: &str, renewed_at: DateTime<Utc>) -> Result<()>;
}
