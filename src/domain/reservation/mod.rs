//! Reservation aggregate
//!
//! Contains the Reservation entity, its time window and lifecycle status,
//! and payment metadata.

pub mod model;

pub use model::{
    PaymentConfirmation, PaymentMethod, Reservation, ReservationStatus, TimeWindow, VehicleInfo,
};
