//! Test doubles for the external collaborators.
//!
//! In-memory stand-ins for the identity directory, the entitlement
//! verifier, and the payment gateway. Shipped as a first-class module so
//! downstream applications can drive their own integration tests against
//! the same doubles the crate's tests use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::checkout::gateway::{
    ChargeReceipt, CreateSessionRequest, GatewayClient, GatewaySession,
};
use crate::error::{PointeError, Result};
use crate::ledger::manager::{RenewalVerdict, RenewalVerifier, UserDirectory};
use crate::ledger::transaction::Transaction;

/// In-memory user directory with per-user trial flags.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, bool>>>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with an unused trial.
    pub fn add_user(&self, user_id: &str) {
        self.users
            .write()
            .unwrap()
            .insert(user_id.to_string(), false);
    }

    pub fn trial_used(&self, user_id: &str) -> bool {
        self.users
            .read()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(false)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.read().unwrap().contains_key(user_id))
    }

    async fn mark_trial_used(&self, user_id: &str) -> Result<bool> {
        let mut users = self.users.write().unwrap();
        match users.get_mut(user_id) {
            Some(used) if *used => Ok(false),
            Some(used) => {
                *used = true;
                Ok(true)
            }
            None => Err(PointeError::validation(format!("user '{user_id}' not found"))),
        }
    }
}

/// Renewal verifier with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRenewalVerifier {
    /// Every renewal verifies.
    Verified,
    /// Every renewal is explicitly rejected.
    NotVerified,
    /// The verifier is unreachable (infrastructure error).
    Unavailable,
}

#[async_trait]
impl RenewalVerifier for StaticRenewalVerifier {
    async fn verify_renewal(&self, _transaction: &Transaction) -> Result<RenewalVerdict> {
        match self {
            Self::Verified => Ok(RenewalVerdict::Verified),
            Self::NotVerified => Ok(RenewalVerdict::NotVerified),
            Self::Unavailable => Err(PointeError::external("verification service unreachable")),
        }
    }
}

/// A charge observed by [`MockGatewayClient`].
#[derive(Debug, Clone)]
pub struct ChargeRecord {
    pub token: String,
    pub amount_cents: i64,
    pub reference: String,
}

#[derive(Default)]
struct MockGatewayInner {
    session_counter: AtomicU64,
    charge_counter: AtomicU64,
    charges: RwLock<Vec<ChargeRecord>>,
    fail_sessions: AtomicBool,
    fail_charges: AtomicBool,
}

/// Mock gateway client recording every call.
#[derive(Default, Clone)]
pub struct MockGatewayClient {
    inner: Arc<MockGatewayInner>,
}

impl MockGatewayClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent session creations fail with an external error.
    pub fn fail_sessions(&self, fail: bool) {
        self.inner.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent charges fail with a provider decline.
    pub fn fail_charges(&self, fail: bool) {
        self.inner.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Every charge observed so far.
    pub fn charges(&self) -> Vec<ChargeRecord> {
        self.inner.charges.read().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    async fn create_session(&self, _request: CreateSessionRequest) -> Result<GatewaySession> {
        if self.inner.fail_sessions.load(Ordering::SeqCst) {
            return Err(PointeError::external("gateway returned 503"));
        }
        let n = self.inner.session_counter.fetch_add(1, Ordering::SeqCst);
        Ok(GatewaySession {
            gateway_session_id: format!("gs_test_{n}"),
            checkout_url: format!("https://gateway.test/pay/gs_test_{n}"),
        })
    }

    async fn charge_token(
        &self,
        token: &str,
        amount_cents: i64,
        reference: &str,
    ) -> Result<ChargeReceipt> {
        if self.inner.fail_charges.load(Ordering::SeqCst) {
            return Err(PointeError::external("card declined (code 033)"));
        }
        let n = self.inner.charge_counter.fetch_add(1, Ordering::SeqCst);
        self.inner.charges.write().unwrap().push(ChargeRecord {
            token: token.to_string(),
            amount_cents,
            reference: reference.to_string(),
        });
        Ok(ChargeReceipt {
            reference_number: format!("gwref_{n}"),
            approval_number: format!("appr_{n}"),
        })
    }

    async fn refund(&self, _reference_number: &str, _amount_cents: i64) -> Result<()> {
        Ok(())
    }
}
