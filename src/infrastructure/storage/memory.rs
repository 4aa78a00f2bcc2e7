//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    DomainError, DomainResult, Mutation, ParkingSpot, PersistenceAdapter, Reservation,
};

/// In-memory storage for development and testing
pub struct InMemoryStorage {
    spots: DashMap<String, ParkingSpot>,
    reservations: DashMap<String, Reservation>,
    /// Serialises commits so a batch validates and applies as one step
    commit_lock: Mutex<()>,
    /// Number of upcoming commits that fail with a persistence error
    injected_failures: AtomicU32,
    /// Number of upcoming commits acknowledged only after `ack_delay_ms`
    delayed_acks: AtomicU32,
    ack_delay_ms: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            spots: DashMap::new(),
            reservations: DashMap::new(),
            commit_lock: Mutex::new(()),
            injected_failures: AtomicU32::new(0),
            delayed_acks: AtomicU32::new(0),
            ack_delay_ms: AtomicU64::new(0),
        }
    }

    /// Storage pre-populated with `spots`
    pub fn with_spots(spots: impl IntoIterator<Item = ParkingSpot>) -> Self {
        let storage = Self::new();
        for spot in spots {
            storage.spots.insert(spot.id.clone(), spot);
        }
        storage
    }

    /// Make the next `count` commits fail as if the backend were unreachable.
    pub fn fail_next_commits(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Apply the next `count` commits, then stall `delay` before returning,
    /// like a backend whose acknowledgement is lost or late.
    pub fn delay_next_acks(&self, count: u32, delay: Duration) {
        self.ack_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self.delayed_acks.store(count, Ordering::SeqCst);
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    fn take_injected_failure(&self) -> bool {
        take_one(&self.injected_failures)
    }

    fn take_ack_delay(&self) -> Option<Duration> {
        take_one(&self.delayed_acks)
            .then(|| Duration::from_millis(self.ack_delay_ms.load(Ordering::SeqCst)))
    }

    /// Current reservation, preferring a version staged earlier in the batch.
    fn staged_reservation(
        &self,
        staged: &HashMap<String, Reservation>,
        id: &str,
    ) -> DomainResult<Reservation> {
        staged
            .get(id)
            .cloned()
            .or_else(|| self.reservations.get(id).map(|r| r.clone()))
            .ok_or_else(|| DomainError::StaleWrite(format!("reservation {} does not exist", id)))
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryStorage {
    async fn load_spot(&self, id: &str) -> DomainResult<Option<ParkingSpot>> {
        Ok(self.spots.get(id).map(|s| s.clone()))
    }

    async fn list_spots(&self) -> DomainResult<Vec<ParkingSpot>> {
        let mut spots: Vec<ParkingSpot> = self.spots.iter().map(|e| e.value().clone()).collect();
        spots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(spots)
    }

    async fn load_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(id).map(|r| r.clone()))
    }

    async fn list_reservations_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let mut result: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn list_live_reservations(&self) -> DomainResult<Vec<Reservation>> {
        let mut result: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().is_live())
            .map(|e| e.value().clone())
            .collect();
        result.sort_by(|a, b| a.window.start.cmp(&b.window.start).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DomainResult<()> {
        let guard = self.commit_lock.lock().await;

        if self.take_injected_failure() {
            return Err(DomainError::Persistence("storage unavailable".into()));
        }

        // Validate the whole batch against a staged view before touching the tables.
        let mut spots: HashMap<String, ParkingSpot> = HashMap::new();
        let mut reservations: HashMap<String, Reservation> = HashMap::new();

        for mutation in mutations {
            match mutation {
                Mutation::UpsertSpot(spot) => {
                    spots.insert(spot.id.clone(), spot);
                }
                Mutation::InsertReservation(reservation) => {
                    if reservations.contains_key(&reservation.id) {
                        return Err(DomainError::StaleWrite(format!(
                            "reservation {} inserted twice",
                            reservation.id
                        )));
                    }
                    if let Some(stored) = self.reservations.get(&reservation.id) {
                        if stored.same_booking(&reservation) {
                            debug!(reservation_id = %reservation.id, "Insert already applied");
                            continue;
                        }
                        return Err(DomainError::StaleWrite(format!(
                            "reservation {} already exists",
                            reservation.id
                        )));
                    }
                    reservations.insert(reservation.id.clone(), reservation);
                }
                Mutation::TransitionReservation {
                    reservation,
                    expected,
                } => {
                    let mut current = self.staged_reservation(&reservations, &reservation.id)?;
                    if current.status != expected {
                        if reservation.transition_applied(&current) {
                            debug!(reservation_id = %reservation.id, "Transition already applied");
                            continue;
                        }
                        return Err(DomainError::StaleWrite(format!(
                            "reservation {} is {}, expected {}",
                            current.id, current.status, expected
                        )));
                    }
                    current.status = reservation.status;
                    current.updated_at = reservation.updated_at;
                    reservations.insert(current.id.clone(), current);
                }
                Mutation::RecordPayment {
                    reservation_id,
                    payment,
                    updated_at,
                } => {
                    let mut current = self.staged_reservation(&reservations, &reservation_id)?;
                    if let Some(existing) = &current.payment {
                        if existing.reference != payment.reference {
                            return Err(DomainError::StaleWrite(format!(
                                "reservation {} already carries payment {}",
                                reservation_id, existing.reference
                            )));
                        }
                    }
                    current.payment = Some(payment);
                    current.updated_at = updated_at;
                    reservations.insert(current.id.clone(), current);
                }
            }
        }

        debug!(
            spots = spots.len(),
            reservations = reservations.len(),
            "Applying in-memory commit"
        );

        for (id, spot) in spots {
            self.spots.insert(id, spot);
        }
        for (id, reservation) in reservations {
            self.reservations.insert(id, reservation);
        }
        drop(guard);

        if let Some(delay) = self.take_ack_delay() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}
