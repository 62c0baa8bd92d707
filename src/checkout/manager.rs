//! Opening hosted checkout sessions.

use chrono::{Duration, Utc};

use crate::error::{PointeError, Result};
use crate::ledger::ProductKind;

use super::gateway::{CreateSessionRequest, CustomerDetails, GatewayClient};
use super::pending::{CheckoutStore, PendingCheckout, checkout_reference};

/// An access product offered for purchase.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub kind: ProductKind,
    pub price_cents: i64,
    /// Required for subscriptions.
    pub monthly_entries: Option<u32>,
    /// Required for punch cards.
    pub total_entries: Option<u32>,
}

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public base URL the gateway calls back to.
    pub callback_base_url: String,
    /// Pending-metadata lifetime, matching the gateway session lifetime.
    pub session_ttl: Duration,
}

impl CheckoutSettings {
    /// Validate and build settings; the callback base must be an
    /// HTTPS URL so the gateway's redirects cannot be downgraded.
    pub fn new(callback_base_url: impl Into<String>, session_ttl: Duration) -> Result<Self> {
        let callback_base_url = callback_base_url.into();
        let parsed = url::Url::parse(&callback_base_url)
            .map_err(|e| PointeError::validation(format!("invalid callback URL: {e}")))?;
        if parsed.scheme() != "https" {
            return Err(PointeError::validation("callback URL must use HTTPS"));
        }
        Ok(Self {
            callback_base_url,
            session_ttl,
        })
    }

    fn callback_url(&self) -> String {
        format!(
            "{}/payment/callback",
            self.callback_base_url.trim_end_matches('/')
        )
    }

    fn failure_callback_url(&self) -> String {
        format!(
            "{}/payment/callback/failure",
            self.callback_base_url.trim_end_matches('/')
        )
    }
}

/// A checkout session opened for redirect.
#[derive(Debug, Clone)]
pub struct OpenCheckout {
    /// Our unique reference; the status endpoint polls on it.
    pub reference: String,
    /// The gateway's hosted payment page.
    pub checkout_url: String,
}

/// Opens gateway checkout sessions and records the pending purchase
/// intent for the reconciliation engine.
pub struct CheckoutManager<C: CheckoutStore, G: GatewayClient> {
    checkouts: C,
    gateway: G,
    settings: CheckoutSettings,
}

impl<C: CheckoutStore, G: GatewayClient> CheckoutManager<C, G> {
    #[must_use]
    pub fn new(checkouts: C, gateway: G, settings: CheckoutSettings) -> Self {
        Self {
            checkouts,
            gateway,
            settings,
        }
    }

    /// Open a hosted checkout session for `product`.
    ///
    /// A gateway failure here is retryable from the caller's side: each
    /// attempt generates a fresh unique reference, so nothing needs to be
    /// cleaned up.
    pub async fn open_checkout(
        &self,
        customer: CustomerDetails,
        product: &Product,
    ) -> Result<OpenCheckout> {
        let (monthly_entries, total_entries) = validate_product(product)?;

        let now = Utc::now();
        let reference = checkout_reference(&customer.user_id, &product.id, now);
        let recurring = product.kind == ProductKind::Subscription;

        let session = self
            .gateway
            .create_session(CreateSessionRequest {
                reference: reference.clone(),
                amount_cents: product.price_cents,
                product_name: product.name.clone(),
                recurring,
                customer: customer.clone(),
                callback_url: self.settings.callback_url(),
                failure_callback_url: self.settings.failure_callback_url(),
            })
            .await?;

        let pending = PendingCheckout {
            reference: reference.clone(),
            user_id: customer.user_id,
            product_id: product.id.clone(),
            kind: product.kind,
            recurring,
            amount_cents: product.price_cents,
            monthly_entries,
            total_entries,
            gateway_session_id: session.gateway_session_id,
            created_at: now,
            expires_at: now + self.settings.session_ttl,
        };
        self.checkouts.put(&pending).await?;

        tracing::info!(
            target: "pointe::checkout",
            reference = %reference,
            product = %product.id,
            kind = %product.kind,
            "checkout session opened"
        );

        Ok(OpenCheckout {
            reference,
            checkout_url: session.checkout_url,
        })
    }
}

fn validate_product(product: &Product) -> Result<(Option<u32>, Option<u32>)> {
    if product.price_cents <= 0 {
        return Err(PointeError::validation("product price must be positive"));
    }
    match product.kind {
        ProductKind::Subscription => match product.monthly_entries {
            Some(entries) if entries > 0 => Ok((Some(entries), None)),
            _ => Err(PointeError::validation(
                "subscription product requires monthly entries",
            )),
        },
        ProductKind::PunchCard => match product.total_entries {
            Some(entries) if entries > 0 => Ok((None, Some(entries))),
            _ => Err(PointeError::validation(
                "punch card product requires total entries",
            )),
        },
        ProductKind::TrialLesson => Ok((None, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::pending::memory::InMemoryCheckoutStore;
    use crate::testing::MockGatewayClient;

    fn settings() -> CheckoutSettings {
        CheckoutSettings::new("https://studio.example.com", Duration::hours(1)).unwrap()
    }

    fn customer(user: &str) -> CustomerDetails {
        CustomerDetails {
            user_id: user.to_string(),
            email: Some("member@example.com".to_string()),
            full_name: Some("Dana Member".to_string()),
            phone: None,
        }
    }

    fn punch_card_product() -> Product {
        Product {
            id: "card10".to_string(),
            name: "10-entry card".to_string(),
            kind: ProductKind::PunchCard,
            price_cents: 45_000,
            monthly_entries: None,
            total_entries: Some(10),
        }
    }

    #[tokio::test]
    async fn open_checkout_records_pending_metadata() {
        let store = InMemoryCheckoutStore::new();
        let manager = CheckoutManager::new(store.clone(), MockGatewayClient::new(), settings());

        let open = manager
            .open_checkout(customer("u1"), &punch_card_product())
            .await
            .unwrap();
        assert!(open.checkout_url.starts_with("https://gateway.test/pay/"));

        let pending = store.get(&open.reference).await.unwrap().unwrap();
        assert_eq!(pending.user_id, "u1");
        assert_eq!(pending.kind, ProductKind::PunchCard);
        assert_eq!(pending.total_entries, Some(10));
        assert!(!pending.recurring);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_no_metadata() {
        let store = InMemoryCheckoutStore::new();
        let gateway = MockGatewayClient::new();
        gateway.fail_sessions(true);
        let manager = CheckoutManager::new(store.clone(), gateway, settings());

        let err = manager
            .open_checkout(customer("u1"), &punch_card_product())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn subscription_product_requires_monthly_entries() {
        let manager = CheckoutManager::new(
            InMemoryCheckoutStore::new(),
            MockGatewayClient::new(),
            settings(),
        );
        let product = Product {
            id: "sub8".to_string(),
            name: "8 classes / month".to_string(),
            kind: ProductKind::Subscription,
            price_cents: 35_000,
            monthly_entries: None,
            total_entries: None,
        };

        let err = manager
            .open_checkout(customer("u1"), &product)
            .await
            .unwrap_err();
        assert!(matches!(err, PointeError::Validation(_)));
    }

    #[test]
    fn settings_require_https() {
        assert!(CheckoutSettings::new("http://studio.example.com", Duration::hours(1)).is_err());
        assert!(CheckoutSettings::new("nonsense", Duration::hours(1)).is_err());
    }
}
