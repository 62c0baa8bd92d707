//! The transaction ledger: the authoritative record of purchased access.
//!
//! One [`Transaction`] per purchased product instance, with consumable
//! entry balances mutated only through the conditional operations on
//! [`LedgerManager`] and [`LedgerStore`]. Uniqueness of the gateway
//! reference number is enforced here, not in the webhook path, so
//! duplicate callback deliveries are absorbed wherever they land.

pub mod error;
pub mod manager;
pub mod memory;
pub mod store;
pub mod transaction;

pub use error::LedgerError;
pub use manager::{
    CreateOutcome, LedgerManager, RenewalVerdict, RenewalVerifier, UserDirectory,
};
pub use memory::InMemoryLedgerStore;
pub use store::{InsertOutcome, LedgerStore};
pub use transaction::{
    NewTransaction, NewTransactionKind, ProductKind, Transaction, TransactionKind,
};
