//! Pointe: payment ledger, reconciliation, and class-scheduling core
//! for studio booking applications.
//!
//! Members buy access products (subscriptions, punch cards, trial
//! lessons) through an external card-payment gateway; seats in scheduled
//! classes are reserved against the resulting ledger entries; a periodic
//! job drives recurring billing. Pointe owns the parts that must be
//! correct under concurrency and at-least-once delivery:
//!
//! - **checkout**: hosted gateway sessions, pending-intent metadata, and
//!   the reconciliation engine that turns each gateway callback into
//!   exactly one ledger entry;
//! - **ledger**: the authoritative transaction record with conditional,
//!   atomic entry-balance operations and the renewal sweep;
//! - **billing**: the single-flight recurring-billing job;
//! - **schedule**: recurring-occurrence expansion and call-time seat
//!   capacity;
//! - **registration**: admission and cancellation against ledger
//!   entitlements;
//! - **http**: the gateway callback and status-polling routes.
//!
//! Identity, persistence, and the gateway's internals stay behind trait
//! seams (`UserDirectory`, `LedgerStore`, `CheckoutStore`,
//! `RegistrationStore`, `GatewayClient`); in-memory implementations ship
//! for tests and single-process deployments.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pointe::checkout::{InMemoryCheckoutStore, ReconciliationEngine};
//! use pointe::ledger::{InMemoryLedgerStore, LedgerManager};
//! use pointe::testing::InMemoryUserDirectory;
//!
//! #[tokio::main]
//! async fn main() {
//!     pointe::init_tracing();
//!
//!     let ledger = LedgerManager::new(InMemoryLedgerStore::new(), InMemoryUserDirectory::new());
//!     let engine = Arc::new(ReconciliationEngine::new(InMemoryCheckoutStore::new(), ledger));
//!     let app = pointe::http::payment_routes(engine);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod billing;
pub mod checkout;
mod config;
mod error;
pub mod http;
pub mod ledger;
pub mod registration;
pub mod schedule;
pub mod testing;

// Re-exports for the public API
pub use billing::{BillingScheduler, RunOptions, RunSummary};
pub use checkout::{
    CallbackOutcome, CallbackPayload, CheckoutManager, CheckoutSettings, CheckoutStore,
    CustomerDetails, GatewayClient, InMemoryCheckoutStore, LiveGatewayClient, LiveGatewayConfig,
    OpenCheckout, PaymentStatus, PendingCheckout, Product, ReconciliationEngine,
};
pub use config::{BillingConfig, CheckoutConfig, Config, GatewayConfig, ServerConfig};
pub use error::{PointeError, Result};
pub use ledger::{
    CreateOutcome, InMemoryLedgerStore, LedgerError, LedgerManager, LedgerStore, NewTransaction,
    NewTransactionKind, ProductKind, RenewalVerdict, RenewalVerifier, Transaction,
    TransactionKind, UserDirectory,
};
pub use registration::RegistrationService;
pub use schedule::{
    CapacityChecker, ClassTemplate, InMemoryRegistrationStore, Occurrence, Registration,
    RegistrationStatus, RegistrationStore, occurrences_in_window, validate_window,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults.
///
/// Call early in `main()`, before building the app.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log level filter (e.g. "info", "pointe=debug")
/// - `POINTE_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("POINTE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
