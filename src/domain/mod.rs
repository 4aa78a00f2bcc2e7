pub mod clock;
pub mod events;
pub mod pricing;
pub mod repositories;
pub mod reservation;
pub mod spot;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventMessage, ReservationEvent, SpotStatusChangedEvent};
pub use pricing::{PriceBreakdown, PricingPolicy};
pub use repositories::{DomainResult, Mutation, PersistenceAdapter, ReconcileReport};
pub use reservation::{
    PaymentConfirmation, PaymentMethod, Reservation, ReservationStatus, TimeWindow, VehicleInfo,
};
pub use spot::{Occupancy, ParkingSpot, SpotCatalog, SpotStatus, SpotType, StaticCatalog};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
