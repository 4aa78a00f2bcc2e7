//! Spot aggregate
//!
//! Contains the ParkingSpot entity, its status, and the catalog port that
//! supplies static spot definitions.

pub mod model;
pub mod repository;

pub use model::{derive_status, Occupancy, ParkingSpot, SpotStatus, SpotType};
pub use repository::{SpotCatalog, StaticCatalog};
