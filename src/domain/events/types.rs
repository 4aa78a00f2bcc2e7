//! Change events
//!
//! Every reservation event carries the full reservation snapshot so that
//! consumers can apply it as an upsert keyed by the reservation id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reservation::Reservation;
use crate::domain::spot::SpotStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ReservationEvent {
    ReservationCreated(Reservation),
    ReservationActivated(Reservation),
    ReservationCompleted(Reservation),
    ReservationCancelled(Reservation),
    PaymentRecorded(Reservation),
    SpotStatusChanged(SpotStatusChangedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotStatusChangedEvent {
    pub spot_id: String,
    pub facility_id: String,
    pub old_status: SpotStatus,
    pub new_status: SpotStatus,
    /// Per-spot counter, bumped on every status change
    pub version: u64,
}

impl ReservationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReservationCreated(_) => "reservation_created",
            Self::ReservationActivated(_) => "reservation_activated",
            Self::ReservationCompleted(_) => "reservation_completed",
            Self::ReservationCancelled(_) => "reservation_cancelled",
            Self::PaymentRecorded(_) => "payment_recorded",
            Self::SpotStatusChanged(_) => "spot_status_changed",
        }
    }

    fn reservation(&self) -> Option<&Reservation> {
        match self {
            Self::ReservationCreated(r)
            | Self::ReservationActivated(r)
            | Self::ReservationCompleted(r)
            | Self::ReservationCancelled(r)
            | Self::PaymentRecorded(r) => Some(r),
            Self::SpotStatusChanged(_) => None,
        }
    }

    pub fn spot_id(&self) -> &str {
        match self {
            Self::SpotStatusChanged(e) => &e.spot_id,
            other => other
                .reservation()
                .map(|r| r.spot_id.as_str())
                .unwrap_or_default(),
        }
    }

    pub fn reservation_id(&self) -> Option<&str> {
        self.reservation().map(|r| r.id.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.reservation().map(|r| r.user_id.as_str())
    }

    /// Key consumers upsert on
    pub fn entity_id(&self) -> String {
        match self.reservation_id() {
            Some(id) => format!("reservation:{}", id),
            None => format!("spot:{}", self.spot_id()),
        }
    }
}

/// Wrapper for sending events with delivery metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Unique per publish; a redelivered message keeps its id
    pub id: String,
    /// Monotonic across the notifier; higher wins when upserting
    pub sequence: u64,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ReservationEvent,
}

impl EventMessage {
    pub fn new(event: ReservationEvent, sequence: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence,
            entity_id: event.entity_id(),
            timestamp: Utc::now(),
            event,
        }
    }
}
