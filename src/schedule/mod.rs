//! Class scheduling: recurring-occurrence expansion and seat capacity.

pub mod capacity;
pub mod event;
pub mod occurrence;

pub use capacity::{
    CapacityChecker, Registration, RegistrationStatus, RegistrationStore,
    memory::InMemoryRegistrationStore,
};
pub use event::{ClassTemplate, Occurrence};
pub use occurrence::{MAX_WINDOW_DAYS, occurrences_in_window, validate_window};
