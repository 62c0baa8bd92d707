//! Recurring billing.

pub mod scheduler;

pub use scheduler::{BillingScheduler, RunOptions, RunSummary};
