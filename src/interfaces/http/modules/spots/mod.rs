//! Spot module: listing, maintenance, facility occupancy

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
