//! Seat-capacity checking against confirmed registrations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::event::ClassTemplate;

/// A seat reservation for one occurrence of a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    /// Ledger transaction the seat was admitted against; `None` for free
    /// event types.
    pub transaction_id: Option<String>,
    pub event_id: String,
    pub occurrence_date: NaiveDate,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
    Cancelled,
}

/// Storage seam for registrations.
///
/// `insert` must reject a second `Confirmed` registration for the same
/// (user, event, occurrence date) atomically; callers pre-check, but the
/// store is the authority under concurrency.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Insert a registration. Fails with a conflict if the user already
    /// holds a confirmed seat for the same event and date.
    async fn insert(&self, registration: &Registration) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Registration>>;

    /// The user's confirmed registration for this occurrence, if any.
    async fn find_confirmed(
        &self,
        user_id: &str,
        event_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Registration>>;

    /// Count confirmed registrations for this occurrence, at day
    /// granularity, at call time.
    async fn count_confirmed(&self, event_id: &str, date: NaiveDate) -> Result<u32>;

    async fn set_status(&self, id: &str, status: RegistrationStatus) -> Result<()>;
}

/// Read-only capacity check over confirmed registrations.
///
/// The count is always computed at call time; a denormalized counter
/// would drift from ground truth under concurrent registrations and
/// cancellations on the same occurrence.
pub struct CapacityChecker<R: RegistrationStore> {
    registrations: R,
}

impl<R: RegistrationStore> CapacityChecker<R> {
    #[must_use]
    pub fn new(registrations: R) -> Self {
        Self { registrations }
    }

    /// Whether the occurrence on `date` still has a seat available.
    pub async fn has_capacity(
        &self,
        template: &ClassTemplate,
        date: NaiveDate,
    ) -> Result<bool> {
        let confirmed = self
            .registrations
            .count_confirmed(&template.id, date)
            .await?;
        Ok(confirmed < template.max_registrations)
    }
}

/// In-memory registration store.
///
/// Suitable for tests and single-process deployments; wraps data in `Arc`
/// for cheap cloning.
pub mod memory {
    use super::*;
    use crate::error::PointeError;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Default, Clone)]
    pub struct InMemoryRegistrationStore {
        inner: Arc<RwLock<HashMap<String, Registration>>>,
    }

    impl InMemoryRegistrationStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RegistrationStore for InMemoryRegistrationStore {
        async fn insert(&self, registration: &Registration) -> Result<()> {
            let mut map = self.inner.write().unwrap();
            let duplicate = map.values().any(|r| {
                r.status == RegistrationStatus::Confirmed
                    && r.user_id == registration.user_id
                    && r.event_id == registration.event_id
                    && r.occurrence_date == registration.occurrence_date
            });
            if duplicate {
                return Err(PointeError::conflict(
                    "already registered for this class date",
                ));
            }
            map.insert(registration.id.clone(), registration.clone());
            Ok(())
        }

        async fn get(&self, id: &str) -> Result<Option<Registration>> {
            Ok(self.inner.read().unwrap().get(id).cloned())
        }

        async fn find_confirmed(
            &self,
            user_id: &str,
            event_id: &str,
            date: NaiveDate,
        ) -> Result<Option<Registration>> {
            Ok(self
                .inner
                .read()
                .unwrap()
                .values()
                .find(|r| {
                    r.status == RegistrationStatus::Confirmed
                        && r.user_id == user_id
                        && r.event_id == event_id
                        && r.occurrence_date == date
                })
                .cloned())
        }

        async fn count_confirmed(&self, event_id: &str, date: NaiveDate) -> Result<u32> {
            Ok(self
                .inner
                .read()
                .unwrap()
                .values()
                .filter(|r| {
                    r.status == RegistrationStatus::Confirmed
                        && r.event_id == event_id
                        && r.occurrence_date == date
                })
                .count() as u32)
        }

        async fn set_status(&self, id: &str, status: RegistrationStatus) -> Result<()> {
            let mut map = self.inner.write().unwrap();
            match map.get_mut(id) {
                Some(registration) => {
                    registration.status = status;
                    Ok(())
                }
                None => Err(PointeError::not_found(format!("registration {id}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryRegistrationStore;
    use super::*;
    use chrono::TimeZone;

    fn template(max: u32) -> ClassTemplate {
        ClassTemplate {
            id: "yoga1".to_string(),
            title: "Yoga".to_string(),
            starts_at: Utc.with_ymd_and_hms(2026, 8, 5, 18, 0, 0).unwrap(),
            is_recurring: true,
            interval_days: Some(7),
            max_registrations: max,
            free: false,
        }
    }

    fn registration(id: &str, user: &str, date: NaiveDate) -> Registration {
        Registration {
            id: id.to_string(),
            user_id: user.to_string(),
            transaction_id: Some("tx1".to_string()),
            event_id: "yoga1".to_string(),
            occurrence_date: date,
            status: RegistrationStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn capacity_counts_confirmed_at_call_time() {
        let store = InMemoryRegistrationStore::new();
        let checker = CapacityChecker::new(store.clone());
        let template = template(2);
        let date: NaiveDate = "2026-08-05".parse().unwrap();

        assert!(checker.has_capacity(&template, date).await.unwrap());

        store.insert(&registration("r1", "u1", date)).await.unwrap();
        store.insert(&registration("r2", "u2", date)).await.unwrap();
        assert!(!checker.has_capacity(&template, date).await.unwrap());

        // Cancelling frees the seat immediately; no counter to drift.
        store
            .set_status("r2", RegistrationStatus::Cancelled)
            .await
            .unwrap();
        assert!(checker.has_capacity(&template, date).await.unwrap());
    }

    #[tokio::test]
    async fn other_dates_do_not_count() {
        let store = InMemoryRegistrationStore::new();
        let checker = CapacityChecker::new(store.clone());
        let template = template(1);

        store
            .insert(&registration("r1", "u1", "2026-08-05".parse().unwrap()))
            .await
            .unwrap();
        assert!(checker
            .has_capacity(&template, "2026-08-12".parse().unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn duplicate_confirmed_registration_rejected() {
        let store = InMemoryRegistrationStore::new();
        let date: NaiveDate = "2026-08-05".parse().unwrap();

        store.insert(&registration("r1", "u1", date)).await.unwrap();
        let err = store
            .insert(&registration("r2", "u1", date))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::PointeError::Conflict(_)));
    }
}
