//! Domain events
//!
//! Event types that represent committed reservation and spot changes.
//! The notifier that fans them out lives in `application::events`.

pub mod types;

pub use types::{EventMessage, ReservationEvent, SpotStatusChangedEvent};
