//! Hosted checkout and payment reconciliation.
//!
//! A purchase flows through three stages: [`CheckoutManager`] opens a
//! gateway session and records the pending intent, the member pays on
//! the gateway's hosted page, and [`ReconciliationEngine`] absorbs the
//! asynchronous callback into the ledger.

pub mod gateway;
pub mod live_gateway;
pub mod manager;
pub mod pending;
pub mod reconcile;

pub use gateway::{
    ChargeReceipt, CreateSessionRequest, CustomerDetails, GatewayClient, GatewaySession,
};
pub use live_gateway::{LiveGatewayClient, LiveGatewayConfig};
pub use manager::{CheckoutManager, CheckoutSettings, OpenCheckout, Product};
pub use pending::{
    CheckoutStore, DEFAULT_CHECKOUT_TTL, PendingCheckout, checkout_reference,
    memory::InMemoryCheckoutStore, parse_checkout_reference,
};
pub use reconcile::{CallbackOutcome, CallbackPayload, PaymentStatus, ReconciliationEngine};
