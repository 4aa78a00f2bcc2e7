//! Spot inventory
//!
//! Authoritative in-memory view of which live reservations hold each spot.
//! The non-overlap check and the hold insertion happen under the spot's
//! `DashMap` entry lock, so two overlapping `reserve` calls can never both
//! succeed. Spot status is always derived from the holds and the disabled
//! flag, never stored independently.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::spot::derive_status;
use crate::domain::{
    DomainError, DomainResult, Occupancy, ParkingSpot, Reservation, SpotStatus,
    SpotStatusChangedEvent, TimeWindow,
};

/// Proof that a hold was placed. Pass it back to `release` to undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken {
    pub spot_id: String,
    pub reservation_id: String,
    pub window: TimeWindow,
}

/// Hypothetical change used to compute the spot record a commit will write.
#[derive(Debug, Clone, Copy)]
pub enum Projection<'a> {
    /// Holds as they are now
    Current,
    /// As if this reservation's hold were released
    Released(&'a str),
    Disabled,
    Enabled,
}

#[derive(Debug, Clone)]
struct Hold {
    reservation_id: String,
    window: TimeWindow,
}

struct SpotSlot {
    /// `status` is the last status announced for this spot
    spot: ParkingSpot,
    disabled: bool,
    holds: Vec<Hold>,
    version: u64,
    commit_lock: Arc<Mutex<()>>,
}

impl SpotSlot {
    fn new(spot: ParkingSpot) -> Self {
        Self {
            disabled: spot.is_disabled(),
            spot,
            holds: Vec::new(),
            version: 0,
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    fn derive(&self, disabled: bool, skip: Option<&str>, now: DateTime<Utc>) -> SpotStatus {
        let windows = self
            .holds
            .iter()
            .filter(|h| Some(h.reservation_id.as_str()) != skip)
            .map(|h| &h.window);
        derive_status(disabled, windows, now)
    }
}

/// Per-spot holds and status
#[derive(Default)]
pub struct SpotInventory {
    slots: DashMap<String, SpotSlot>,
}

impl SpotInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole inventory with `spots` and holds for `live_reservations`.
    pub fn load(&self, spots: Vec<ParkingSpot>, live_reservations: &[Reservation]) {
        self.slots.clear();
        for spot in spots {
            self.slots.insert(spot.id.clone(), SpotSlot::new(spot));
        }

        let mut holds = 0usize;
        let mut orphaned = 0usize;
        for reservation in live_reservations.iter().filter(|r| r.is_live()) {
            match self.slots.get_mut(&reservation.spot_id) {
                Some(mut slot) => {
                    slot.holds.push(Hold {
                        reservation_id: reservation.id.clone(),
                        window: reservation.window,
                    });
                    holds += 1;
                }
                None => orphaned += 1,
            }
        }

        info!(
            spots = self.slots.len(),
            holds,
            orphaned,
            "Spot inventory loaded"
        );
    }

    pub fn contains(&self, spot_id: &str) -> bool {
        self.slots.contains_key(spot_id)
    }

    /// Lock serialising commit and publish for one spot.
    pub fn commit_lock(&self, spot_id: &str) -> DomainResult<Arc<Mutex<()>>> {
        self.slots
            .get(spot_id)
            .map(|slot| slot.commit_lock.clone())
            .ok_or_else(|| DomainError::not_found("spot", spot_id))
    }

    /// Spot record as last announced
    pub fn spot(&self, spot_id: &str) -> DomainResult<ParkingSpot> {
        self.slots
            .get(spot_id)
            .map(|slot| slot.spot.clone())
            .ok_or_else(|| DomainError::not_found("spot", spot_id))
    }

    /// Place a hold for `window`. Fails with `Conflict` if any live hold overlaps.
    pub fn reserve(
        &self,
        spot_id: &str,
        window: TimeWindow,
        reservation_id: &str,
    ) -> DomainResult<ReservationToken> {
        let mut slot = self
            .slots
            .get_mut(spot_id)
            .ok_or_else(|| DomainError::not_found("spot", spot_id))?;

        if slot.disabled {
            return Err(DomainError::SpotDisabled(spot_id.to_string()));
        }
        if slot.holds.iter().any(|h| h.window.overlaps(&window)) {
            debug!(spot_id, reservation_id, "Overlapping hold rejected");
            return Err(DomainError::Conflict {
                spot_id: spot_id.to_string(),
            });
        }

        slot.holds.push(Hold {
            reservation_id: reservation_id.to_string(),
            window,
        });

        Ok(ReservationToken {
            spot_id: spot_id.to_string(),
            reservation_id: reservation_id.to_string(),
            window,
        })
    }

    /// Drop the hold of `reservation_id`. Returns whether a hold was removed;
    /// releasing twice is a no-op.
    pub fn release(&self, spot_id: &str, reservation_id: &str) -> bool {
        match self.slots.get_mut(spot_id) {
            Some(mut slot) => {
                let before = slot.holds.len();
                slot.holds.retain(|h| h.reservation_id != reservation_id);
                before != slot.holds.len()
            }
            None => false,
        }
    }

    pub fn disable(&self, spot_id: &str) -> DomainResult<()> {
        self.set_disabled(spot_id, true)
    }

    pub fn enable(&self, spot_id: &str) -> DomainResult<()> {
        self.set_disabled(spot_id, false)
    }

    fn set_disabled(&self, spot_id: &str, disabled: bool) -> DomainResult<()> {
        let mut slot = self
            .slots
            .get_mut(spot_id)
            .ok_or_else(|| DomainError::not_found("spot", spot_id))?;
        slot.disabled = disabled;
        Ok(())
    }

    pub fn is_disabled(&self, spot_id: &str) -> DomainResult<bool> {
        self.slots
            .get(spot_id)
            .map(|slot| slot.disabled)
            .ok_or_else(|| DomainError::not_found("spot", spot_id))
    }

    /// Spot record with the status it would have after `projection`.
    pub fn projected(
        &self,
        spot_id: &str,
        projection: Projection<'_>,
        now: DateTime<Utc>,
    ) -> DomainResult<ParkingSpot> {
        let slot = self
            .slots
            .get(spot_id)
            .ok_or_else(|| DomainError::not_found("spot", spot_id))?;
        let status = match projection {
            Projection::Current => slot.derive(slot.disabled, None, now),
            Projection::Released(id) => slot.derive(slot.disabled, Some(id), now),
            Projection::Disabled => slot.derive(true, None, now),
            Projection::Enabled => slot.derive(false, None, now),
        };
        let mut spot = slot.spot.clone();
        spot.status = status;
        Ok(spot)
    }

    /// Current derived status
    pub fn status(&self, spot_id: &str, now: DateTime<Utc>) -> DomainResult<SpotStatus> {
        self.projected(spot_id, Projection::Current, now)
            .map(|spot| spot.status)
    }

    /// Record the derived status as announced. Returns the change, with a
    /// bumped version, when it differs from the previous announcement.
    pub fn refresh(
        &self,
        spot_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<SpotStatusChangedEvent>> {
        let mut slot = self
            .slots
            .get_mut(spot_id)
            .ok_or_else(|| DomainError::not_found("spot", spot_id))?;
        let new_status = slot.derive(slot.disabled, None, now);
        let old_status = slot.spot.status;
        if new_status == old_status {
            return Ok(None);
        }

        slot.spot.status = new_status;
        slot.version += 1;
        Ok(Some(SpotStatusChangedEvent {
            spot_id: spot_id.to_string(),
            facility_id: slot.spot.facility_id.clone(),
            old_status,
            new_status,
            version: slot.version,
        }))
    }

    /// Spot ids whose derived status no longer matches the announced one
    pub fn drifted(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| slot.derive(slot.disabled, None, now) != slot.spot.status)
            .map(|slot| slot.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// All spots with their derived status, ordered by id
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<ParkingSpot> {
        let mut spots: Vec<ParkingSpot> = self
            .slots
            .iter()
            .map(|slot| {
                let mut spot = slot.spot.clone();
                spot.status = slot.derive(slot.disabled, None, now);
                spot
            })
            .collect();
        spots.sort_by(|a, b| a.id.cmp(&b.id));
        spots
    }

    /// Status counts for one facility
    pub fn occupancy(&self, facility_id: &str, now: DateTime<Utc>) -> DomainResult<Occupancy> {
        let mut occupancy = Occupancy::new(facility_id);
        for slot in self.slots.iter() {
            if slot.spot.facility_id == facility_id {
                occupancy.count(slot.derive(slot.disabled, None, now));
            }
        }
        if occupancy.total == 0 {
            return Err(DomainError::not_found("facility", facility_id));
        }
        Ok(occupancy)
    }

    /// Every held `(spot_id, reservation_id)` pair
    pub fn held_reservations(&self) -> Vec<(String, String)> {
        let mut held: Vec<(String, String)> = self
            .slots
            .iter()
            .flat_map(|slot| {
                let spot_id = slot.key().clone();
                slot.holds
                    .iter()
                    .map(|h| (spot_id.clone(), h.reservation_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        held.sort();
        held
    }

    pub fn hold_count(&self, spot_id: &str) -> usize {
        self.slots
            .get(spot_id)
            .map(|slot| slot.holds.len())
            .unwrap_or(0)
    }
}
