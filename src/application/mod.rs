//! Application layer - use cases over the domain
//!
//! Contains:
//! - `inventory`: authoritative per-spot holds
//! - `events`: change notifier
//! - `services`: reservation orchestration and the lifecycle monitor
//! - `ports`: collaborator interfaces (ownership)

pub mod events;
pub mod inventory;
pub mod ports;
pub mod services;

pub use events::{ChangeNotifier, Delivery, EventFilter, Subscription};
pub use inventory::{Projection, ReservationToken, SpotInventory};
pub use ports::{OwnershipPolicy, RequesterOwnership};
pub use services::{
    CreateReservation, LifecycleConfig, LifecycleMonitor, LifecycleReport, ReservationService,
    ReservationSettings,
};
