//! Seat registration against ledger entitlements.
//!
//! Admits or denies seat reservations by combining the occurrence
//! generator, the capacity checker, and the ledger. The service only
//! reads transactions; balance changes go through the ledger's
//! entry-consumption operations.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{PointeError, Result};
use crate::ledger::manager::{LedgerManager, RenewalVerifier, UserDirectory};
use crate::ledger::store::LedgerStore;
use crate::ledger::transaction::{Transaction, TransactionKind};
use crate::schedule::capacity::{
    CapacityChecker, Registration, RegistrationStatus, RegistrationStore,
};
use crate::schedule::event::ClassTemplate;

pub struct RegistrationService<R, S, U>
where
    R: RegistrationStore + Clone,
    S: LedgerStore,
    U: UserDirectory,
{
    registrations: R,
    capacity: CapacityChecker<R>,
    ledger: LedgerManager<S, U>,
}

impl<R, S, U> RegistrationService<R, S, U>
where
    R: RegistrationStore + Clone,
    S: LedgerStore,
    U: UserDirectory,
{
    #[must_use]
    pub fn new(registrations: R, ledger: LedgerManager<S, U>) -> Self {
        Self {
            capacity: CapacityChecker::new(registrations.clone()),
            registrations,
            ledger,
        }
    }

    /// Reserve a seat for `user_id` in the occurrence of `template` on
    /// `date`.
    ///
    /// Preconditions are checked in order and each failure names the
    /// unmet one: the class must occur on the date, the user must not
    /// already hold a confirmed seat, the occurrence must have capacity,
    /// and (for paid classes) the user needs an active transaction with
    /// a remaining entry. The entry is consumed through the ledger
    /// before the seat is written; if the seat write then loses a race,
    /// the entry is restored.
    pub async fn register(
        &self,
        user_id: &str,
        template: &ClassTemplate,
        date: NaiveDate,
        verifier: &impl RenewalVerifier,
    ) -> Result<Registration> {
        if !template.occurs_on(date) {
            return Err(PointeError::validation(format!(
                "class '{}' does not occur on {date}",
                template.id
            )));
        }

        if self
            .registrations
            .find_confirmed(user_id, &template.id, date)
            .await?
            .is_some()
        {
            return Err(PointeError::conflict(
                "already registered for this class date",
            ));
        }

        if !self.capacity.has_capacity(template, date).await? {
            return Err(PointeError::conflict("class is full"));
        }

        let transaction_id = if template.free {
            None
        } else {
            let transaction = self.eligible_transaction(user_id, verifier).await?;
            self.consume_entry(&transaction).await?;
            Some(transaction.id)
        };

        let registration = Registration {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            transaction_id: transaction_id.clone(),
            event_id: template.id.clone(),
            occurrence_date: date,
            status: RegistrationStatus::Confirmed,
            created_at: Utc::now(),
        };

        if let Err(err) = self.registrations.insert(&registration).await {
            // Lost a race for the seat; give the entry back.
            if let Some(transaction_id) = &transaction_id {
                self.restore_entry_by_id(transaction_id).await;
            }
            return Err(err);
        }

        tracing::info!(
            target: "pointe::registration",
            user_id,
            event_id = %template.id,
            date = %date,
            "seat confirmed"
        );
        Ok(registration)
    }

    /// Cancel a confirmed registration and give the consumed entry back.
    /// Cancelling twice is a no-op.
    pub async fn cancel(&self, registration_id: &str) -> Result<()> {
        let registration = self
            .registrations
            .get(registration_id)
            .await?
            .ok_or_else(|| {
                PointeError::not_found(format!("registration {registration_id}"))
            })?;

        if registration.status == RegistrationStatus::Cancelled {
            return Ok(());
        }

        self.registrations
            .set_status(registration_id, RegistrationStatus::Cancelled)
            .await?;

        if let Some(transaction_id) = &registration.transaction_id {
            self.restore_entry(transaction_id).await?;
        }

        tracing::info!(
            target: "pointe::registration",
            registration_id,
            "seat cancelled"
        );
        Ok(())
    }

    /// The user's first active transaction that can still admit a seat:
    /// subscriptions before punch cards before trials. Runs the renewal
    /// sweep first so a stale subscription gets its month rolled over
    /// before being judged.
    async fn eligible_transaction(
        &self,
        user_id: &str,
        verifier: &impl RenewalVerifier,
    ) -> Result<Transaction> {
        let active = self
            .ledger
            .check_and_renew_subscriptions(user_id, verifier)
            .await?;

        if active.is_empty() {
            return Err(PointeError::validation(
                "no active subscription, punch card, or trial lesson",
            ));
        }

        let pick = |want: fn(&TransactionKind) -> bool| {
            active
                .iter()
                .find(|t| want(&t.kind) && t.has_remaining_entries())
        };

        pick(|k| matches!(k, TransactionKind::Subscription { .. }))
            .or_else(|| pick(|k| matches!(k, TransactionKind::PunchCard { .. })))
            .or_else(|| pick(|k| matches!(k, TransactionKind::TrialLesson)))
            .cloned()
            .ok_or_else(|| {
                PointeError::validation(
                    "all subscriptions and punch cards are out of entries",
                )
            })
    }

    async fn consume_entry(&self, transaction: &Transaction) -> Result<()> {
        match &transaction.kind {
            TransactionKind::Subscription { .. } => {
                self.ledger.use_subscription_entry(&transaction.id).await?;
            }
            TransactionKind::PunchCard { .. } => {
                self.ledger.use_punch_card_entry(&transaction.id).await?;
            }
            TransactionKind::TrialLesson => {
                self.ledger.use_trial_entry(&transaction.id).await?;
            }
        }
        Ok(())
    }

    async fn restore_entry(&self, transaction_id: &str) -> Result<()> {
        let Some(transaction) = self.ledger.store().get_transaction(transaction_id).await?
        else {
            return Ok(());
        };
        match &transaction.kind {
            TransactionKind::Subscription { .. } => {
                self.ledger
                    .restore_subscription_entry(transaction_id)
                    .await?;
            }
            TransactionKind::PunchCard { .. } => {
                self.ledger.restore_punch_card_entry(transaction_id).await?;
            }
            TransactionKind::TrialLesson => {
                self.ledger.restore_trial_entry(transaction_id).await?;
            }
        }
        Ok(())
    }

    async fn restore_entry_by_id(&self, transaction_id: &str) {
        if let Err(err) = self.restore_entry(transaction_id).await {
            tracing::error!(
                target: "pointe::registration",
                transaction_id,
                error = %err,
                "failed to restore entry after losing the seat race"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryLedgerStore;
    use crate::ledger::store::LedgerStore as _;
    use crate::ledger::transaction::Transaction;
    use crate::schedule::capacity::memory::InMemoryRegistrationStore;
    use crate::testing::{InMemoryUserDirectory, StaticRenewalVerifier};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    type Service =
        RegistrationService<InMemoryRegistrationStore, InMemoryLedgerStore, InMemoryUserDirectory>;

    fn service() -> (Service, InMemoryLedgerStore, InMemoryUserDirectory) {
        let registrations = InMemoryRegistrationStore::new();
        let ledger_store = InMemoryLedgerStore::new();
        let users = InMemoryUserDirectory::new();
        users.add_user("u1");
        users.add_user("u2");
        let service = RegistrationService::new(
            registrations,
            LedgerManager::new(ledger_store.clone(), users.clone()),
        );
        (service, ledger_store, users)
    }

    fn weekly_class(max: u32) -> ClassTemplate {
        ClassTemplate {
            id: "ballet1".to_string(),
            title: "Ballet".to_string(),
            starts_at: Utc.with_ymd_and_hms(2026, 8, 5, 18, 0, 0).unwrap(),
            is_recurring: true,
            interval_days: Some(7),
            max_registrations: max,
            free: false,
        }
    }

    fn punch_card(id: &str, user: &str, remaining: u32) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: id.to_string(),
            user_id: user.to_string(),
            kind: TransactionKind::PunchCard {
                total_entries: 10,
                entries_remaining: remaining,
            },
            amount_cents: 45_000,
            external_reference: format!("ref-{id}"),
            card_suffix: None,
            card_brand: None,
            is_active: true,
            deactivated_reason: None,
            purchased_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription_renewed_at(id: &str, user: &str, renewed: DateTime<Utc>) -> Transaction {
        let mut tx = punch_card(id, user, 0);
        tx.kind = TransactionKind::Subscription {
            monthly_entries: 8,
            entries_used_this_month: 8,
            charge_token: Some("tok".to_string()),
            last_payment_at: Some(renewed),
            last_renewal_at: renewed,
        };
        tx.purchased_at = renewed;
        tx
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn registering_consumes_a_punch_card_entry() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&punch_card("tx1", "u1", 10))
            .await
            .unwrap();

        let registration = service
            .register("u1", &weekly_class(5), date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();
        assert_eq!(registration.transaction_id.as_deref(), Some("tx1"));

        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(matches!(
            tx.kind,
            TransactionKind::PunchCard {
                entries_remaining: 9,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn wrong_date_is_rejected_with_the_precondition() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&punch_card("tx1", "u1", 10))
            .await
            .unwrap();

        // Class runs on Wednesdays; Thursday is not an occurrence.
        let err = service
            .register("u1", &weekly_class(5), date("2026-08-13"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap_err();
        assert!(matches!(err, PointeError::Validation(_)));
        assert!(err.to_string().contains("does not occur"));
    }

    #[tokio::test]
    async fn double_registration_is_a_conflict() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&punch_card("tx1", "u1", 10))
            .await
            .unwrap();

        let class = weekly_class(5);
        service
            .register("u1", &class, date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();
        let err = service
            .register("u1", &class, date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap_err();
        assert!(matches!(err, PointeError::Conflict(_)));
        assert!(err.to_string().contains("already registered"));

        // The failed attempt consumed nothing.
        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(matches!(
            tx.kind,
            TransactionKind::PunchCard {
                entries_remaining: 9,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn full_class_is_a_conflict() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&punch_card("tx1", "u1", 10))
            .await
            .unwrap();
        ledger_store
            .insert_transaction(&punch_card("tx2", "u2", 10))
            .await
            .unwrap();

        let class = weekly_class(1);
        service
            .register("u1", &class, date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();
        let err = service
            .register("u2", &class, date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("full"));
    }

    #[tokio::test]
    async fn no_entitlement_names_the_precondition() {
        let (service, _, _) = service();
        let err = service
            .register("u1", &weekly_class(5), date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no active subscription"));
    }

    #[tokio::test]
    async fn free_event_admits_without_a_transaction() {
        let (service, _, _) = service();
        let mut class = weekly_class(5);
        class.free = true;

        let registration = service
            .register("u1", &class, date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();
        assert!(registration.transaction_id.is_none());
    }

    #[tokio::test]
    async fn cancelling_restores_the_entry_and_is_idempotent() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&punch_card("tx1", "u1", 1))
            .await
            .unwrap();

        let registration = service
            .register("u1", &weekly_class(5), date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();

        // The card hit zero and deactivated.
        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(!tx.is_active);

        service.cancel(&registration.id).await.unwrap();
        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(tx.is_active);
        assert!(matches!(
            tx.kind,
            TransactionKind::PunchCard {
                entries_remaining: 1,
                ..
            }
        ));

        // Second cancel must not mint another entry.
        service.cancel(&registration.id).await.unwrap();
        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        assert!(matches!(
            tx.kind,
            TransactionKind::PunchCard {
                entries_remaining: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stale_subscription_renews_on_the_way_in() {
        let (service, ledger_store, _) = service();
        // Renewed two months ago with a fully used allowance; the sweep
        // should roll the month over and make it usable again.
        ledger_store
            .insert_transaction(&subscription_renewed_at(
                "tx1",
                "u1",
                Utc::now() - Duration::days(62),
            ))
            .await
            .unwrap();

        let registration = service
            .register("u1", &weekly_class(5), date("2026-08-12"), &StaticRenewalVerifier::Verified)
            .await
            .unwrap();
        assert_eq!(registration.transaction_id.as_deref(), Some("tx1"));

        let tx = ledger_store.get_transaction("tx1").await.unwrap().unwrap();
        match tx.kind {
            TransactionKind::Subscription {
                entries_used_this_month,
                ..
            } => assert_eq!(entries_used_this_month, 1),
            _ => panic!("expected subscription"),
        }
    }

    #[tokio::test]
    async fn unverified_renewal_deactivates_and_denies() {
        let (service, ledger_store, _) = service();
        ledger_store
            .insert_transaction(&subscription_renewed_at(
                "tx1",
                "u1",
                Utc::now() - Duration::days(62),
            ))
            .await
            .unwrap();

        let err = service
            .register(
                "u1",
                &weekly_class(5),
                date("2026-08-12"),
                &StaticRenewalVerifier::NotVerified,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PointeError::Validation(_)));
        assert!(!ledger_store.get_transaction("tx1").await.unwrap().unwrap().is_active);
    }
}
