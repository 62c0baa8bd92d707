//! Class templates and their dated occurrences.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled class: either a one-time event or a recurring template.
///
/// Recurring templates are never persisted per-date; their occurrences are
/// computed on demand by [`super::occurrence::occurrences_in_window`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassTemplate {
    pub id: String,
    pub title: String,
    /// Anchor date/time of the first (or only) occurrence.
    pub starts_at: DateTime<Utc>,
    pub is_recurring: bool,
    /// Days between occurrences; meaningful only when `is_recurring`.
    pub interval_days: Option<u32>,
    /// Seat capacity per occurrence.
    pub max_registrations: u32,
    /// Free events admit without a ledger transaction.
    pub free: bool,
}

impl ClassTemplate {
    /// The anchor date at day granularity (UTC reference frame).
    #[must_use]
    pub fn anchor_date(&self) -> NaiveDate {
        self.starts_at.date_naive()
    }

    /// Whether the class occurs on `date`. One-time events match their
    /// anchor date only; recurring templates defer to the generator.
    #[must_use]
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        if self.is_recurring {
            !super::occurrence::occurrences_in_window(self, date, date).is_empty()
        } else {
            self.anchor_date() == date
        }
    }
}

/// One concrete dated instance of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Derived id: `{template_id}_{ISO-date}`.
    pub id: String,
    pub template_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub max_registrations: u32,
}

impl Occurrence {
    pub(crate) fn from_template(template: &ClassTemplate, date: NaiveDate) -> Self {
        Self {
            id: format!("{}_{}", template.id, date),
            template_id: template.id.clone(),
            title: template.title.clone(),
            date,
            max_registrations: template.max_registrations,
        }
    }
}
