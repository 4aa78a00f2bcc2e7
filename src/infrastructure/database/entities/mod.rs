//! SeaORM entities

pub mod parking_spot;
pub mod reservation;
