//! Persistence port for the domain layer
//!
//! Contains:
//! - `PersistenceAdapter` — durable storage for spots and reservations
//! - `Mutation` — one change inside an atomic `commit`
//! - `DomainResult` — standard result type for domain operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::reservation::{PaymentConfirmation, Reservation, ReservationStatus};
use super::spot::{derive_status, ParkingSpot};
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// A single write. `commit` applies a batch of these all-or-nothing.
///
/// Replaying a mutation that is already stored succeeds without changes, so
/// a commit that landed but timed out before acknowledging can be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or replace a spot record
    UpsertSpot(ParkingSpot),
    /// Insert a new reservation; fails with `StaleWrite` if the id holds
    /// a different booking
    InsertReservation(Reservation),
    /// Replace status and `updated_at`, only if the stored status is still
    /// `expected`. Already at the target status with the same `updated_at`
    /// counts as applied.
    TransitionReservation {
        reservation: Reservation,
        expected: ReservationStatus,
    },
    /// Replace payment metadata only; never touches status. Fails with
    /// `StaleWrite` when a payment with another reference is stored.
    RecordPayment {
        reservation_id: String,
        payment: PaymentConfirmation,
        updated_at: DateTime<Utc>,
    },
}

/// State handed to the inventory after startup reconciliation
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub spots: Vec<ParkingSpot>,
    /// Reservations in {upcoming, active}
    pub live_reservations: Vec<Reservation>,
    /// Spots whose stored status disagreed with their reservations
    pub corrected_spots: Vec<String>,
}

/// Durable storage for spot and reservation records.
///
/// The reservation service is the only writer. Implementations must make
/// `commit` atomic: either every mutation is applied or none is.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn load_spot(&self, id: &str) -> DomainResult<Option<ParkingSpot>>;

    async fn list_spots(&self) -> DomainResult<Vec<ParkingSpot>>;

    async fn load_reservation(&self, id: &str) -> DomainResult<Option<Reservation>>;

    /// Newest first (`created_at` descending, ties by id)
    async fn list_reservations_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>>;

    /// Reservations in {upcoming, active}
    async fn list_live_reservations(&self) -> DomainResult<Vec<Reservation>>;

    /// Apply `mutations` atomically. A failed precondition yields `StaleWrite`.
    async fn commit(&self, mutations: Vec<Mutation>) -> DomainResult<()>;

    /// Cheap liveness probe for health checks
    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }

    /// Re-derive every spot's stored status from the live reservations
    /// referencing it and persist corrections. Holds for terminal
    /// reservations are thereby dropped.
    async fn reconcile_on_startup(&self, now: DateTime<Utc>) -> DomainResult<ReconcileReport> {
        let spots = self.list_spots().await?;
        let live_reservations = self.list_live_reservations().await?;

        let mut corrections = Vec::new();
        let mut corrected_spots = Vec::new();
        let mut reconciled = Vec::with_capacity(spots.len());

        for mut spot in spots {
            let windows = live_reservations
                .iter()
                .filter(|r| r.spot_id == spot.id)
                .map(|r| &r.window);
            let derived = derive_status(spot.is_disabled(), windows, now);
            if derived != spot.status {
                warn!(
                    spot_id = %spot.id,
                    stored = %spot.status,
                    derived = %derived,
                    "Correcting stale spot status"
                );
                spot.status = derived;
                corrected_spots.push(spot.id.clone());
                corrections.push(Mutation::UpsertSpot(spot.clone()));
            }
            reconciled.push(spot);
        }

        if !corrections.is_empty() {
            self.commit(corrections).await?;
        }

        info!(
            spots = reconciled.len(),
            live_reservations = live_reservations.len(),
            corrected = corrected_spots.len(),
            "Startup reconciliation finished"
        );

        Ok(ReconcileReport {
            spots: reconciled,
            live_reservations,
            corrected_spots,
        })
    }
}
