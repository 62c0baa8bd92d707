//! Ledger transactions: one entry per purchased product instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three access products the studio sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Subscription,
    PunchCard,
    TrialLesson,
}

impl ProductKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::PunchCard => "punch_card",
            Self::TrialLesson => "trial_lesson",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subscription" => Some(Self::Subscription),
            "punch_card" => Some(Self::PunchCard),
            "trial_lesson" => Some(Self::TrialLesson),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific transaction state.
///
/// A closed sum type: a subscription cannot exist without its monthly
/// entry allowance, nor a punch card without its balance, so invalid
/// combinations are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    Subscription {
        /// Entry allowance per calendar month (immutable).
        monthly_entries: u32,
        /// Entries consumed this period; reset on renewal.
        entries_used_this_month: u32,
        /// Stored gateway charge token; `None` once revoked. Without it
        /// the subscription can never auto-renew.
        charge_token: Option<String>,
        last_payment_at: Option<DateTime<Utc>>,
        last_renewal_at: DateTime<Utc>,
    },
    PunchCard {
        /// Lifetime entry count (immutable).
        total_entries: u32,
        /// Monotonically decreasing; reaching 0 force-deactivates.
        entries_remaining: u32,
    },
    TrialLesson,
}

impl TransactionKind {
    #[must_use]
    pub fn product_kind(&self) -> ProductKind {
        match self {
            Self::Subscription { .. } => ProductKind::Subscription,
            Self::PunchCard { .. } => ProductKind::PunchCard,
            Self::TrialLesson => ProductKind::TrialLesson,
        }
    }
}

/// One authoritative ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Owner; immutable after creation.
    pub user_id: String,
    pub kind: TransactionKind,
    /// Positive amount, in the studio's single currency, minor units.
    pub amount_cents: i64,
    /// Gateway reference number. Unique across the ledger; the anchor for
    /// idempotent absorption of duplicate callbacks.
    pub external_reference: String,
    pub card_suffix: Option<String>,
    pub card_brand: Option<String>,
    pub is_active: bool,
    /// Why the transaction was deactivated, for operator follow-up.
    pub deactivated_reason: Option<String>,
    /// Immutable purchase timestamp.
    pub purchased_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[must_use]
    pub fn product_kind(&self) -> ProductKind {
        self.kind.product_kind()
    }

    /// Whether this transaction can still admit a class registration.
    #[must_use]
    pub fn has_remaining_entries(&self) -> bool {
        if !self.is_active {
            return false;
        }
        match &self.kind {
            TransactionKind::Subscription {
                monthly_entries,
                entries_used_this_month,
                ..
            } => entries_used_this_month < monthly_entries,
            TransactionKind::PunchCard {
                entries_remaining, ..
            } => *entries_remaining > 0,
            TransactionKind::TrialLesson => true,
        }
    }

    /// The stored charge token, if this is a subscription that still has
    /// one.
    #[must_use]
    pub fn charge_token(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Subscription { charge_token, .. } => charge_token.as_deref(),
            _ => None,
        }
    }

    /// Timestamp the billing scheduler ages charges from:
    /// `last_payment_at`, falling back to the purchase date.
    #[must_use]
    pub fn last_charged_at(&self) -> DateTime<Utc> {
        match &self.kind {
            TransactionKind::Subscription {
                last_payment_at, ..
            } => last_payment_at.unwrap_or(self.purchased_at),
            _ => self.purchased_at,
        }
    }
}

/// Input to [`crate::ledger::LedgerManager::create_transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub kind: NewTransactionKind,
    pub amount_cents: i64,
    pub external_reference: String,
    pub card_suffix: Option<String>,
    pub card_brand: Option<String>,
}

/// Kind-specific creation fields; required fields are enforced by shape.
#[derive(Debug, Clone)]
pub enum NewTransactionKind {
    Subscription {
        monthly_entries: u32,
        charge_token: Option<String>,
    },
    PunchCard {
        total_entries: u32,
    },
    TrialLesson,
}

impl NewTransactionKind {
    #[must_use]
    pub fn product_kind(&self) -> ProductKind {
        match self {
            Self::Subscription { .. } => ProductKind::Subscription,
            Self::PunchCard { .. } => ProductKind::PunchCard,
            Self::TrialLesson => ProductKind::TrialLesson,
        }
    }

    pub(crate) fn into_kind(self, now: DateTime<Utc>) -> TransactionKind {
        match self {
            Self::Subscription {
                monthly_entries,
                charge_token,
            } => TransactionKind::Subscription {
                monthly_entries,
                entries_used_this_month: 0,
                charge_token,
                last_payment_at: Some(now),
                last_renewal_at: now,
            },
            Self::PunchCard { total_entries } => TransactionKind::PunchCard {
                total_entries,
                entries_remaining: total_entries,
            },
            Self::TrialLesson => TransactionKind::TrialLesson,
        }
    }
}
