//! Application services

pub mod lifecycle_monitor;
pub mod reservation;

pub use lifecycle_monitor::{LifecycleConfig, LifecycleMonitor};
pub use reservation::{
    CreateReservation, LifecycleReport, ReservationService, ReservationSettings,
};
