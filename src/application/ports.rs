//! Collaborator ports consumed by the application layer

use crate::domain::Reservation;

/// Identity collaborator answering whether a requester may act on a reservation.
pub trait OwnershipPolicy: Send + Sync {
    fn may_act_on(&self, requester_id: &str, reservation: &Reservation) -> bool;
}

/// Only the user who booked a reservation may act on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequesterOwnership;

impl OwnershipPolicy for RequesterOwnership {
    fn may_act_on(&self, requester_id: &str, reservation: &Reservation) -> bool {
        reservation.user_id == requester_id
    }
}
