//! Payment-gateway client seam.
//!
//! Three operations are consumed from the external gateway: create a
//! hosted checkout session, charge a stored token, refund a settled
//! charge. The client never retries on its own: session creation is not
//! safe to retry blindly without a fresh unique id, and charge retry
//! policy belongs to the calling business operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Caller-chosen unique id, echoed back in the callback.
    pub reference: String,
    pub amount_cents: i64,
    pub product_name: String,
    /// Ask the gateway to store a charge token for recurring billing.
    pub recurring: bool,
    pub customer: CustomerDetails,
    /// Where the gateway posts the success callback.
    pub callback_url: String,
    /// Where the gateway posts the failure callback.
    pub failure_callback_url: String,
}

/// Customer contact fields forwarded to the gateway's hosted page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// A hosted checkout session, ready for redirect.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub gateway_session_id: String,
    pub checkout_url: String,
}

/// Receipt for a one-shot token charge.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    /// The gateway's reference number for this charge.
    pub reference_number: String,
    pub approval_number: String,
}

/// Outbound gateway operations.
///
/// Every call is synchronous from the caller's perspective and carries a
/// bounded timeout in the live implementation; a timeout surfaces as an
/// external-service error, retryable only by the caller's business logic.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Open a hosted checkout session. Never retried automatically: a
    /// fresh attempt needs a fresh unique reference.
    async fn create_session(&self, request: CreateSessionRequest) -> Result<GatewaySession>;

    /// Charge a previously stored token. Failure surfaces the provider's
    /// reason verbatim for diagnostics.
    async fn charge_token(
        &self,
        token: &str,
        amount_cents: i64,
        reference: &str,
    ) -> Result<ChargeReceipt>;

    /// Refund a settled charge by its gateway reference number.
    async fn refund(&self, reference_number: &str, amount_cents: i64) -> Result<()>;
}
