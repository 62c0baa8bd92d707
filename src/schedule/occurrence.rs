//! Occurrence generation for recurring class templates.
//!
//! Pure date arithmetic: a recurring template is expanded into concrete
//! dated occurrences inside a bounded window. All arithmetic happens at
//! day granularity in a single reference frame (UTC) so interval steps
//! cannot drift across DST or time-of-day differences.

use chrono::{Days, NaiveDate};

use crate::error::{PointeError, Result};

use super::event::{ClassTemplate, Occurrence};

/// Largest window the callers are allowed to expand in one request.
pub const MAX_WINDOW_DAYS: i64 = 31;

/// Reject windows that are inverted or exceed [`MAX_WINDOW_DAYS`].
///
/// The generator itself is total; this is the caller-side gate.
pub fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(PointeError::validation("window end precedes start"));
    }
    let span = (end - start).num_days();
    if span > MAX_WINDOW_DAYS {
        return Err(PointeError::validation(format!(
            "window of {span} days exceeds the {MAX_WINDOW_DAYS}-day limit"
        )));
    }
    Ok(())
}

/// Expand a recurring template into its occurrences within `[start, end]`
/// (inclusive).
///
/// Walks forward from the template's anchor in `interval_days` steps until
/// reaching or passing `start`, then emits while `<= end`. No occurrence
/// is ever emitted outside the window, and dates never repeat.
///
/// Degenerate inputs (a non-recurring template, a missing or zero
/// interval, an inverted window) yield an empty list, not an error.
#[must_use]
pub fn occurrences_in_window(
    template: &ClassTemplate,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Occurrence> {
    if !template.is_recurring || end < start {
        return Vec::new();
    }
    let interval = match template.interval_days {
        Some(days) if days > 0 => u64::from(days),
        _ => return Vec::new(),
    };

    let anchor = template.anchor_date();
    let mut date = anchor;

    // Jump to the first step at or past the window start instead of
    // walking day ranges one interval at a time.
    if date < start {
        let gap = (start - date).num_days() as u64;
        let steps = gap.div_ceil(interval);
        date = match anchor.checked_add_days(Days::new(steps * interval)) {
            Some(d) => d,
            None => return Vec::new(),
        };
    }

    let mut occurrences = Vec::new();
    while date <= end {
        occurrences.push(Occurrence::from_template(template, date));
        date = match date.checked_add_days(Days::new(interval)) {
            Some(d) => d,
            None => break,
        };
    }
    occurrences
}
