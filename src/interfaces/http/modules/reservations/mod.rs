//! Reservation module: booking, cancellation, payment recording

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
