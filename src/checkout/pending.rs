//! Pending-checkout metadata.
//!
//! Short-lived records linking a gateway checkout session back to the
//! purchase intent that created it. Presence of a record is the sole
//! signal that a payment is pending; its absence plus a recent matching
//! ledger entry means completed; its absence with no matching entry means
//! unknown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::ledger::ProductKind;

/// Default metadata lifetime, matching the gateway's own hosted-session
/// lifetime.
pub const DEFAULT_CHECKOUT_TTL: Duration = Duration::from_secs(3600);

/// Purchase intent awaiting a gateway callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCheckout {
    /// The caller-chosen unique id, also handed to the gateway:
    /// `{user_id}-{product_id}-{creation_millis}`.
    pub reference: String,
    pub user_id: String,
    pub product_id: String,
    pub kind: ProductKind,
    pub recurring: bool,
    pub amount_cents: i64,
    pub monthly_entries: Option<u32>,
    pub total_entries: Option<u32>,
    /// The gateway's own session id, for diagnostics.
    pub gateway_session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingCheckout {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Build the unique checkout reference for a purchase intent.
#[must_use]
pub fn checkout_reference(user_id: &str, product_id: &str, created_at: DateTime<Utc>) -> String {
    format!("{user_id}-{product_id}-{}", created_at.timestamp_millis())
}

/// Recover `(user_id, product_id)` from a checkout reference.
///
/// The degraded-reconciliation fallback when metadata is lost: relies on
/// the `{user}-{product}-{millis}` structural convention and requires the
/// trailing segment to be numeric. Ids containing `-` are not supported
/// by the convention and yield `None`.
#[must_use]
pub fn parse_checkout_reference(reference: &str) -> Option<(&str, &str)> {
    let mut parts = reference.split('-');
    let user_id = parts.next().filter(|s| !s.is_empty())?;
    let product_id = parts.next().filter(|s| !s.is_empty())?;
    let millis = parts.next()?;
    if parts.next().is_some() || millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some((user_id, product_id))
}

/// Storage seam for pending checkouts.
///
/// Single-key operations are independently atomic; the web-facing
/// checkout path and the asynchronous callback path share a store
/// without extra locking.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn put(&self, pending: &PendingCheckout) -> Result<()>;

    /// Fetch by reference. An expired-but-not-yet-purged entry is treated
    /// as absent and opportunistically deleted.
    async fn get(&self, reference: &str) -> Result<Option<PendingCheckout>>;

    async fn delete(&self, reference: &str) -> Result<()>;

    /// Sweep expired entries; returns how many were removed.
    async fn cleanup_expired(&self) -> Result<usize>;
}

/// In-memory checkout store.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// In-memory store for pending checkouts.
    ///
    /// Suitable for single-process deployments and tests; entries are
    /// lost on restart, which the status endpoint's "unknown" outcome
    /// already accounts for.
    #[derive(Clone)]
    pub struct InMemoryCheckoutStore {
        entries: Arc<RwLock<HashMap<String, PendingCheckout>>>,
    }

    impl InMemoryCheckoutStore {
        #[must_use]
        pub fn new() -> Self {
            Self {
                entries: Arc::new(RwLock::new(HashMap::new())),
            }
        }
    }

    impl Default for InMemoryCheckoutStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl InMemoryCheckoutStore {
        /// Number of stored entries, expired ones included.
        pub async fn len(&self) -> usize {
            self.entries.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.len().await == 0
        }
    }

    #[async_trait]
    impl CheckoutStore for InMemoryCheckoutStore {
        async fn put(&self, pending: &PendingCheckout) -> Result<()> {
            let mut entries = self.entries.write().await;
            entries.insert(pending.reference.clone(), pending.clone());
            Ok(())
        }

        async fn get(&self, reference: &str) -> Result<Option<PendingCheckout>> {
            let entries = self.entries.read().await;
            if let Some(pending) = entries.get(reference) {
                if pending.is_expired() {
                    drop(entries);
                    let mut entries = self.entries.write().await;
                    entries.remove(reference);
                    return Ok(None);
                }
                return Ok(Some(pending.clone()));
            }
            Ok(None)
        }

        async fn delete(&self, reference: &str) -> Result<()> {
            let mut entries = self.entries.write().await;
            entries.remove(reference);
            Ok(())
        }

        async fn cleanup_expired(&self) -> Result<usize> {
            let mut entries = self.entries.write().await;
            let initial_len = entries.len();
            entries.retain(|_, pending| !pending.is_expired());
            Ok(initial_len - entries.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryCheckoutStore;
    use super::*;

    fn pending(reference: &str, ttl: chrono::Duration) -> PendingCheckout {
        let now = Utc::now();
        PendingCheckout {
            reference: reference.to_string(),
            user_id: "u1".to_string(),
            product_id: "p1".to_string(),
            kind: ProductKind::PunchCard,
            recurring: false,
            amount_cents: 20_000,
            monthly_entries: None,
            total_entries: Some(10),
            gateway_session_id: "gs_1".to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn reference_round_trip() {
        let created = Utc::now();
        let reference = checkout_reference("u1", "p1", created);
        assert_eq!(parse_checkout_reference(&reference), Some(("u1", "p1")));
    }

    #[test]
    fn reference_parsing_rejects_malformed_input() {
        assert_eq!(parse_checkout_reference("u1-p1-1000"), Some(("u1", "p1")));
        assert_eq!(parse_checkout_reference("u1-p1"), None);
        assert_eq!(parse_checkout_reference("u1-p1-abc"), None);
        assert_eq!(parse_checkout_reference("u1-p1-1000-extra"), None);
        assert_eq!(parse_checkout_reference(""), None);
        assert_eq!(parse_checkout_reference("-p1-1000"), None);
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemoryCheckoutStore::new();
        let pending = pending("u1-p1-1000", chrono::Duration::hours(1));

        store.put(&pending).await.unwrap();
        assert!(store.get("u1-p1-1000").await.unwrap().is_some());

        store.delete("u1-p1-1000").await.unwrap();
        assert!(store.get("u1-p1-1000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent_and_is_purged() {
        let store = InMemoryCheckoutStore::new();
        let pending = pending("u1-p1-1000", chrono::Duration::milliseconds(-1));

        store.put(&pending).await.unwrap();
        assert!(store.get("u1-p1-1000").await.unwrap().is_none());
        // The opportunistic delete removed it entirely.
        assert_eq!(store.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_sweeps_only_expired_entries() {
        let store = InMemoryCheckoutStore::new();
        store
            .put(&pending("u1-p1-1000", chrono::Duration::milliseconds(-1)))
            .await
            .unwrap();
        store
            .put(&pending("u2-p1-2000", chrono::Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.get("u2-p1-2000").await.unwrap().is_some());
    }
}
