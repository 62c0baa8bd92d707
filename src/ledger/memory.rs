//! In-memory ledger store.
//!
//! Short write-locked critical sections make every conditional entry
//! operation atomic, mirroring what a production store does with
//! conditional updates. Suitable for tests and single-process
//! deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::Result;

use super::error::LedgerError;
use super::store::{InsertOutcome, LedgerStore};
use super::transaction::{Transaction, TransactionKind};

#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every transaction, for test assertions.
    pub fn all(&self) -> Vec<Transaction> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Run a mutation under the write lock and return the updated entry
    /// as observed inside the critical section.
    fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut Transaction) -> Result<()>,
    ) -> Result<Transaction> {
        let mut map = self.inner.write().unwrap();
        let transaction = map.get_mut(id).ok_or(LedgerError::TransactionNotFound {
            id: id.to_string(),
        })?;
        f(transaction)?;
        transaction.updated_at = Utc::now();
        Ok(transaction.clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<InsertOutcome> {
        let mut map = self.inner.write().unwrap();
        if let Some(existing) = map
            .values()
            .find(|t| t.external_reference == transaction.external_reference)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        map.insert(transaction.id.clone(), transaction.clone());
        Ok(InsertOutcome::Created(transaction.clone()))
    }

    async fn remove_transaction(&self, id: &str) -> Result<()> {
        self.inner.write().unwrap().remove(id);
        Ok(())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self.inner.read().unwrap().get(id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .find(|t| t.external_reference == reference)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .inner
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn list_active_subscriptions(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .filter(|t| t.is_active && matches!(t.kind, TransactionKind::Subscription { .. }))
            .cloned()
            .collect())
    }

    async fn latest_for_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id && t.created_at >= since)
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn set_active(&self, id: &str, active: bool, reason: Option<&str>) -> Result<()> {
        self.update(id, |transaction| {
            transaction.is_active = active;
            transaction.deactivated_reason = if active {
                None
            } else {
                reason.map(String::from)
            };
            Ok(())
        })?;
        Ok(())
    }

    async fn consume_subscription_entry(&self, id: &str) -> Result<Transaction> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::Subscription {
                monthly_entries,
                entries_used_this_month,
                ..
            } => {
                if *entries_used_this_month >= *monthly_entries {
                    return Err(LedgerError::MonthlyLimitReached {
                        id: id.to_string(),
                    }
                    .into());
                }
                *entries_used_this_month += 1;
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "subscription",
            }
            .into()),
        })
    }

    async fn restore_subscription_entry(&self, id: &str) -> Result<Transaction> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::Subscription {
                entries_used_this_month,
                ..
            } => {
                *entries_used_this_month = entries_used_this_month.saturating_sub(1);
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "subscription",
            }
            .into()),
        })
    }

    async fn consume_punch_card_entry(&self, id: &str) -> Result<Transaction> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::PunchCard {
                entries_remaining, ..
            } => {
                if *entries_remaining == 0 {
                    return Err(LedgerError::EntriesExhausted {
                        id: id.to_string(),
                    }
                    .into());
                }
                *entries_remaining -= 1;
                if *entries_remaining == 0 {
                    transaction.is_active = false;
                    transaction.deactivated_reason = Some("entries exhausted".to_string());
                }
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "punch card",
            }
            .into()),
        })
    }

    async fn restore_punch_card_entry(&self, id: &str) -> Result<Transaction> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::PunchCard {
                total_entries,
                entries_remaining,
            } => {
                if *entries_remaining >= *total_entries {
                    return Err(LedgerError::BalanceOverflow {
                        id: id.to_string(),
                    }
                    .into());
                }
                *entries_remaining += 1;
                transaction.is_active = true;
                transaction.deactivated_reason = None;
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "punch card",
            }
            .into()),
        })
    }

    async fn record_charge(
        &self,
        id: &str,
        paid_at: DateTime<Utc>,
        new_reference: &str,
    ) -> Result<()> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::Subscription {
                last_payment_at,
                entries_used_this_month,
                ..
            } => {
                *last_payment_at = Some(paid_at);
                *entries_used_this_month = 0;
                transaction.external_reference = new_reference.to_string();
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "subscription",
            }
            .into()),
        })?;
        Ok(())
    }

    async fn record_renewal(&self, id: &str, renewed_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |transaction| match &mut transaction.kind {
            TransactionKind::Subscription {
                last_renewal_at,
                entries_used_this_month,
                ..
            } => {
                *last_renewal_at = renewed_at;
                *entries_used_this_month = 0;
                Ok(())
            }
            _ => Err(LedgerError::WrongKind {
                id: id.to_string(),
                expected: "subscription",
            }
            .into()),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PointeError;

    fn punch_card(id: &str, reference: &str, entries: u32) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: id.to_string(),
            user_id: "u1".to_string(),
            kind: TransactionKind::PunchCard {
                total_entries: entries,
                entries_remaining: entries,
            },
            amount_cents: 20_000,
            external_reference: reference.to_string(),
            card_suffix: None,
            card_brand: None,
            is_active: true,
            deactivated_reason: None,
            purchased_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_reference_returns_existing_entry() {
        let store = InMemoryLedgerStore::new();
        store
            .insert_transaction(&punch_card("tx1", "ref-1", 10))
            .await
            .unwrap();

        let outcome = store
            .insert_transaction(&punch_card("tx2", "ref-1", 10))
            .await
            .unwrap();
        match outcome {
            InsertOutcome::Duplicate(existing) => assert_eq!(existing.id, "tx1"),
            InsertOutcome::Created(_) => panic!("expected duplicate"),
        }
        assert_eq!(store.all().len(), 1);
    }

    #[tokio::test]
    async fn lookup_by_gateway_reference() {
        let store = InMemoryLedgerStore::new();
        store
            .insert_transaction(&punch_card("tx1", "ref-1", 10))
            .await
            .unwrap();

        let found = store.find_by_reference("ref-1").await.unwrap().unwrap();
        assert_eq!(found.id, "tx1");
        assert!(store.find_by_reference("ref-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn punch_card_exhaustion_deactivates_in_same_update() {
        let store = InMemoryLedgerStore::new();
        store
            .insert_transaction(&punch_card("tx1", "ref-1", 2))
            .await
            .unwrap();

        let tx = store.consume_punch_card_entry("tx1").await.unwrap();
        assert!(tx.is_active);

        let tx = store.consume_punch_card_entry("tx1").await.unwrap();
        assert!(!tx.is_active);
        assert_eq!(tx.deactivated_reason.as_deref(), Some("entries exhausted"));

        let err = store.consume_punch_card_entry("tx1").await.unwrap_err();
        assert!(matches!(err, PointeError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_punch_card_consumption_is_exact() {
        let store = InMemoryLedgerStore::new();
        let entries = 5u32;
        store
            .insert_transaction(&punch_card("tx1", "ref-1", entries))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..(entries * 2) {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.consume_punch_card_entry("tx1").await
            }));
        }

        let mut succeeded = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(PointeError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(succeeded, entries);
        assert_eq!(conflicts, entries);

        let tx = store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(!tx.is_active);
    }

    #[tokio::test]
    async fn restore_reactivates_and_respects_total() {
        let store = InMemoryLedgerStore::new();
        store
            .insert_transaction(&punch_card("tx1", "ref-1", 1))
            .await
            .unwrap();

        store.consume_punch_card_entry("tx1").await.unwrap();
        let tx = store.restore_punch_card_entry("tx1").await.unwrap();
        assert!(tx.is_active);

        let err = store.restore_punch_card_entry("tx1").await.unwrap_err();
        assert!(matches!(err, PointeError::Conflict(_)));
    }

    #[tokio::test]
    async fn record_charge_resets_usage_and_swaps_reference() {
        let store = InMemoryLedgerStore::new();
        let now = Utc::now();
        let mut tx = punch_card("tx1", "ref-1", 1);
        tx.kind = TransactionKind::Subscription {
            monthly_entries: 8,
            entries_used_this_month: 3,
            charge_token: Some("tok_1".to_string()),
            last_payment_at: None,
            last_renewal_at: now,
        };
        store.insert_transaction(&tx).await.unwrap();

        store.record_charge("tx1", now, "ref-2").await.unwrap();
        let tx = store.get_transaction("tx1").await.unwrap().unwrap();
        assert_eq!(tx.external_reference, "ref-2");
        match tx.kind {
            TransactionKind::Subscription {
                entries_used_this_month,
                last_payment_at,
                ..
            } => {
                assert_eq!(entries_used_this_month, 0);
                assert_eq!(last_payment_at, Some(now));
            }
            _ => panic!("expected subscription"),
        }
    }
}
