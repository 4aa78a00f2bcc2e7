//! Reservation business logic service
//!
//! Orchestrates quote → hold → durable commit → publish. Every change to a
//! spot or to a reservation on that spot runs under the spot's commit lock,
//! so events for one entity are published in commit order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::application::events::{ChangeNotifier, EventFilter, Subscription};
use crate::application::inventory::{Projection, SpotInventory};
use crate::application::ports::{OwnershipPolicy, RequesterOwnership};
use crate::domain::pricing::{quote, quote_window};
use crate::domain::{
    Clock, DomainError, DomainResult, Mutation, Occupancy, ParkingSpot, PaymentConfirmation,
    PersistenceAdapter, PriceBreakdown, PricingPolicy, ReconcileReport, Reservation,
    ReservationEvent, ReservationStatus, SpotCatalog, SpotType, SystemClock, TimeWindow,
    VehicleInfo,
};
use crate::shared::retry::{persist_with_retry, with_timeout, RetryConfig};

/// Storage call limits
#[derive(Debug, Clone)]
pub struct ReservationSettings {
    /// Per-attempt bound on every storage call
    pub persistence_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            persistence_timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }
}

/// Input for `create_reservation`
#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub spot_id: String,
    pub user_id: String,
    pub spot_type: SpotType,
    pub start: DateTime<Utc>,
    /// An end before `start` is read as the next day
    pub end: DateTime<Utc>,
    pub vehicle: VehicleInfo,
}

/// Outcome of one lifecycle sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub activated: usize,
    pub completed: usize,
    /// Spots whose time-derived status was re-announced
    pub refreshed_spots: usize,
    /// Holds dropped because storage has no live reservation behind them
    pub released_holds: usize,
    pub failures: usize,
}

/// Service for reservation business operations
pub struct ReservationService {
    storage: Arc<dyn PersistenceAdapter>,
    inventory: Arc<SpotInventory>,
    pricing: Arc<PricingPolicy>,
    notifier: Arc<ChangeNotifier>,
    clock: Arc<dyn Clock>,
    ownership: Arc<dyn OwnershipPolicy>,
    settings: ReservationSettings,
}

impl ReservationService {
    pub fn new(
        storage: Arc<dyn PersistenceAdapter>,
        pricing: PricingPolicy,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        Self {
            storage,
            inventory: Arc::new(SpotInventory::new()),
            pricing: Arc::new(pricing),
            notifier,
            clock: Arc::new(SystemClock),
            ownership: Arc::new(RequesterOwnership),
            settings: ReservationSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ownership(mut self, ownership: Arc<dyn OwnershipPolicy>) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_settings(mut self, settings: ReservationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn inventory(&self) -> &Arc<SpotInventory> {
        &self.inventory
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Startup ────────────────────────────────────────────────

    /// Sync catalog spots into storage, reconcile stored spot statuses with
    /// live reservations, rebuild the inventory and catch up the lifecycle.
    pub async fn recover(&self, catalog: &dyn SpotCatalog) -> DomainResult<ReconcileReport> {
        let mut upserts = Vec::new();
        for spot in catalog.spots().await? {
            let stored = self.load_spot(&spot.id).await?;
            match stored {
                None => upserts.push(Mutation::UpsertSpot(spot)),
                Some(stored)
                    if stored.facility_id != spot.facility_id
                        || stored.spot_number != spot.spot_number
                        || stored.spot_type != spot.spot_type =>
                {
                    upserts.push(Mutation::UpsertSpot(ParkingSpot {
                        status: stored.status,
                        ..spot
                    }));
                }
                Some(_) => {}
            }
        }
        if !upserts.is_empty() {
            info!(count = upserts.len(), "Syncing catalog spots into storage");
            self.commit(upserts, "sync_catalog").await?;
        }

        let now = self.clock.now();
        let storage = self.storage.clone();
        let report = persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.reconcile_on_startup(now),
            "reconcile_on_startup",
        )
        .await?;

        self.inventory
            .load(report.spots.clone(), &report.live_reservations);

        let lifecycle = self.advance_lifecycle().await?;
        info!(
            spots = report.spots.len(),
            live_reservations = report.live_reservations.len(),
            corrected = report.corrected_spots.len(),
            activated = lifecycle.activated,
            completed = lifecycle.completed,
            "Reservation state recovered"
        );
        Ok(report)
    }

    // ── Queries ────────────────────────────────────────────────

    /// Price a prospective booking with the configured policy.
    pub fn quote_price(
        &self,
        spot_type: SpotType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<PriceBreakdown> {
        quote(spot_type, start, end, &self.pricing)
    }

    /// The user's reservations, newest first
    pub async fn list_reservations(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let storage = self.storage.clone();
        persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.list_reservations_for_user(user_id),
            "list_reservations",
        )
        .await
    }

    pub async fn get_reservation(
        &self,
        reservation_id: &str,
        requester_id: &str,
    ) -> DomainResult<Reservation> {
        let reservation = self.require_reservation(reservation_id).await?;
        if !self.ownership.may_act_on(requester_id, &reservation) {
            return Err(DomainError::Forbidden(format!(
                "reservation {} belongs to another user",
                reservation_id
            )));
        }
        Ok(reservation)
    }

    pub fn list_spots(&self) -> Vec<ParkingSpot> {
        self.inventory.snapshot(self.clock.now())
    }

    pub fn facility_occupancy(&self, facility_id: &str) -> DomainResult<Occupancy> {
        self.inventory.occupancy(facility_id, self.clock.now())
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.notifier.subscribe(filter)
    }

    /// Single bounded probe, no retry
    pub async fn ping_storage(&self) -> DomainResult<()> {
        with_timeout(self.settings.persistence_timeout, self.storage.ping()).await
    }

    // ── Commands ───────────────────────────────────────────────

    pub async fn create_reservation(&self, request: CreateReservation) -> DomainResult<Reservation> {
        let now = self.clock.now();
        let window = TimeWindow::resolve(request.start, request.end)?;
        if !window.within_next_calendar_day(&self.pricing.offset()?) {
            return Err(DomainError::InvalidWindow(
                "window must end on the start day or the next one".into(),
            ));
        }
        if window.start < now {
            return Err(DomainError::InvalidWindow("start is in the past".into()));
        }

        let spot = self.inventory.spot(&request.spot_id)?;
        if spot.spot_type != request.spot_type {
            return Err(DomainError::InvalidRequest(format!(
                "spot {} is {}, not {}",
                spot.id, spot.spot_type, request.spot_type
            )));
        }

        let price = quote_window(spot.spot_type, &window, &self.pricing)?;
        let reservation = Reservation::new(
            &spot.id,
            request.user_id,
            window,
            price,
            request.vehicle,
            now,
        );

        let lock = self.inventory.commit_lock(&spot.id)?;
        let _guard = lock.lock().await;

        let token = match self.inventory.reserve(&spot.id, window, &reservation.id) {
            Ok(token) => token,
            Err(err) => {
                if matches!(err, DomainError::Conflict { .. }) {
                    metrics::counter!("reservation_conflicts_total").increment(1);
                }
                debug!(spot_id = %spot.id, error = %err, "Reservation rejected");
                return Err(err);
            }
        };

        let committed = match self.inventory.projected(&spot.id, Projection::Current, now) {
            Ok(projected) => {
                self.commit(
                    vec![
                        Mutation::InsertReservation(reservation.clone()),
                        Mutation::UpsertSpot(projected),
                    ],
                    "create_reservation",
                )
                .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = committed {
            // A timed-out attempt may still have landed
            match self
                .stored_matches(&reservation.id, |stored| stored.same_booking(&reservation))
                .await
            {
                Some(true) => warn!(
                    reservation_id = %reservation.id,
                    error = %err,
                    "Commit reported a failure but the reservation is stored"
                ),
                Some(false) => {
                    self.inventory
                        .release(&token.spot_id, &token.reservation_id);
                    warn!(
                        spot_id = %spot.id,
                        reservation_id = %reservation.id,
                        error = %err,
                        "Reservation commit failed, hold released"
                    );
                    return Err(err);
                }
                None => {
                    error!(
                        spot_id = %spot.id,
                        reservation_id = %reservation.id,
                        error = %err,
                        "Reservation commit outcome unknown, hold kept until the next sweep"
                    );
                    return Err(err);
                }
            }
        }

        let change = self.inventory.refresh(&spot.id, now)?;
        self.notifier
            .publish(ReservationEvent::ReservationCreated(reservation.clone()));
        if let Some(change) = change {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }

        metrics::counter!("reservations_created_total", "spot_type" => spot.spot_type.as_str())
            .increment(1);
        info!(
            reservation_id = %reservation.id,
            spot_id = %spot.id,
            user_id = %reservation.user_id,
            price = reservation.final_price(),
            "Reservation created"
        );
        Ok(reservation)
    }

    pub async fn cancel_reservation(
        &self,
        reservation_id: &str,
        requester_id: &str,
    ) -> DomainResult<Reservation> {
        let existing = self.require_reservation(reservation_id).await?;
        if !self.ownership.may_act_on(requester_id, &existing) {
            return Err(DomainError::Forbidden(format!(
                "reservation {} belongs to another user",
                reservation_id
            )));
        }
        // Fail fast before queueing behind the spot lock
        existing.clone().cancel(self.clock.now())?;

        let lock = self.inventory.commit_lock(&existing.spot_id)?;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let mut reservation = self.require_reservation(reservation_id).await?;
        let previous = reservation.status;
        reservation.cancel(now)?;

        let projected = self.inventory.projected(
            &reservation.spot_id,
            Projection::Released(&reservation.id),
            now,
        )?;
        let committed = self
            .commit(
                vec![
                    Mutation::TransitionReservation {
                        reservation: reservation.clone(),
                        expected: previous,
                    },
                    Mutation::UpsertSpot(projected),
                ],
                "cancel_reservation",
            )
            .await;
        if let Err(err) = committed {
            let landed = self
                .stored_matches(&reservation.id, |stored| {
                    stored.status == ReservationStatus::Cancelled
                })
                .await;
            if landed != Some(true) {
                // Storage still holds it (or cannot say); the hold stays
                return Err(err);
            }
            warn!(
                reservation_id = %reservation.id,
                error = %err,
                "Commit reported a failure but the cancellation is stored"
            );
        }

        self.inventory.release(&reservation.spot_id, &reservation.id);
        let change = self.inventory.refresh(&reservation.spot_id, now)?;
        self.notifier
            .publish(ReservationEvent::ReservationCancelled(reservation.clone()));
        if let Some(change) = change {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }

        metrics::counter!("reservations_cancelled_total").increment(1);
        info!(
            reservation_id = %reservation.id,
            spot_id = %reservation.spot_id,
            "Reservation cancelled"
        );
        Ok(reservation)
    }

    /// Record a successful payment. Touches payment metadata only.
    ///
    /// The write carries no status precondition and does not wait for the
    /// spot's commit lock; only the announcement is taken under it, so the
    /// published snapshot is ordered with status events for the same spot.
    pub async fn mark_paid(
        &self,
        reservation_id: &str,
        payment: PaymentConfirmation,
    ) -> DomainResult<Reservation> {
        let mut reservation = self.require_reservation(reservation_id).await?;
        if !reservation.record_payment(payment.clone())? {
            debug!(reservation_id, "Payment already recorded");
            return Ok(reservation);
        }

        let committed = self
            .commit(
                vec![Mutation::RecordPayment {
                    reservation_id: reservation.id.clone(),
                    payment: payment.clone(),
                    updated_at: self.clock.now(),
                }],
                "mark_paid",
            )
            .await;
        match committed {
            Ok(()) => {}
            Err(DomainError::StaleWrite(reason)) => {
                // Another payment landed first
                let mut stored = self.require_reservation(reservation_id).await?;
                if stored.record_payment(payment)? {
                    return Err(DomainError::StaleWrite(reason));
                }
                return Ok(stored);
            }
            Err(err) => return Err(err),
        }

        let lock = self.inventory.commit_lock(&reservation.spot_id)?;
        let _guard = lock.lock().await;
        let stored = self.require_reservation(reservation_id).await?;
        self.notifier
            .publish(ReservationEvent::PaymentRecorded(stored.clone()));
        info!(
            reservation_id = %stored.id,
            method = payment.method.as_str(),
            "Payment recorded"
        );
        Ok(stored)
    }

    pub async fn disable_spot(&self, spot_id: &str) -> DomainResult<ParkingSpot> {
        self.set_spot_disabled(spot_id, true).await
    }

    pub async fn enable_spot(&self, spot_id: &str) -> DomainResult<ParkingSpot> {
        self.set_spot_disabled(spot_id, false).await
    }

    async fn set_spot_disabled(&self, spot_id: &str, disabled: bool) -> DomainResult<ParkingSpot> {
        let lock = self.inventory.commit_lock(spot_id)?;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        if self.inventory.is_disabled(spot_id)? == disabled {
            return self.inventory.projected(spot_id, Projection::Current, now);
        }

        let projection = if disabled {
            Projection::Disabled
        } else {
            Projection::Enabled
        };
        let projected = self.inventory.projected(spot_id, projection, now)?;
        self.commit(
            vec![Mutation::UpsertSpot(projected.clone())],
            "set_spot_disabled",
        )
        .await?;

        if disabled {
            self.inventory.disable(spot_id)?;
        } else {
            self.inventory.enable(spot_id)?;
        }
        if let Some(change) = self.inventory.refresh(spot_id, now)? {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }

        info!(spot_id, disabled, "Spot maintenance flag changed");
        Ok(projected)
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Move live reservations along the clock (upcoming → active → completed,
    /// one committed step at a time), re-announce spots whose time-derived
    /// status changed and drop holds that storage no longer backs.
    pub async fn advance_lifecycle(&self) -> DomainResult<LifecycleReport> {
        let now = self.clock.now();
        let storage = self.storage.clone();
        let live = persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.list_live_reservations(),
            "list_live_reservations",
        )
        .await?;

        let mut report = LifecycleReport::default();
        let live_ids: HashSet<String> = live.iter().map(|r| r.id.clone()).collect();

        for reservation in live {
            if reservation.next_scheduled_step(now).is_none() {
                continue;
            }
            loop {
                match self
                    .apply_schedule_step(&reservation.id, &reservation.spot_id, now)
                    .await
                {
                    Ok(Some(ReservationStatus::Active)) => report.activated += 1,
                    Ok(Some(_)) => report.completed += 1,
                    Ok(None) => break,
                    Err(err) => {
                        report.failures += 1;
                        warn!(
                            reservation_id = %reservation.id,
                            error = %err,
                            "Lifecycle transition failed"
                        );
                        break;
                    }
                }
            }
        }

        for (spot_id, reservation_id) in self.inventory.held_reservations() {
            if live_ids.contains(&reservation_id) {
                continue;
            }
            match self.release_orphaned_hold(&spot_id, &reservation_id, now).await {
                Ok(true) => report.released_holds += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failures += 1;
                    warn!(
                        spot_id = %spot_id,
                        reservation_id = %reservation_id,
                        error = %err,
                        "Orphaned hold check failed"
                    );
                }
            }
        }

        for spot_id in self.inventory.drifted(now) {
            match self.reannounce_spot(&spot_id, now).await {
                Ok(true) => report.refreshed_spots += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failures += 1;
                    warn!(spot_id = %spot_id, error = %err, "Spot status refresh failed");
                }
            }
        }

        if report != LifecycleReport::default() {
            info!(
                activated = report.activated,
                completed = report.completed,
                refreshed_spots = report.refreshed_spots,
                released_holds = report.released_holds,
                failures = report.failures,
                "Lifecycle sweep applied changes"
            );
        }
        Ok(report)
    }

    /// Commit the next single lifecycle step for one reservation.
    async fn apply_schedule_step(
        &self,
        reservation_id: &str,
        spot_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<ReservationStatus>> {
        let lock = self.inventory.commit_lock(spot_id)?;
        let _guard = lock.lock().await;

        let mut reservation = self.require_reservation(reservation_id).await?;
        let previous = reservation.status;
        let Some(next) = reservation.next_scheduled_step(now) else {
            return Ok(None);
        };
        reservation.transition(next, now)?;

        let projection = if next == ReservationStatus::Completed {
            Projection::Released(&reservation.id)
        } else {
            Projection::Current
        };
        let projected = self.inventory.projected(spot_id, projection, now)?;
        self.commit(
            vec![
                Mutation::TransitionReservation {
                    reservation: reservation.clone(),
                    expected: previous,
                },
                Mutation::UpsertSpot(projected),
            ],
            "advance_lifecycle",
        )
        .await?;

        if next == ReservationStatus::Completed {
            self.inventory.release(spot_id, &reservation.id);
            metrics::counter!("reservations_completed_total").increment(1);
        }
        let change = self.inventory.refresh(spot_id, now)?;
        let event = match next {
            ReservationStatus::Completed => ReservationEvent::ReservationCompleted(reservation),
            _ => ReservationEvent::ReservationActivated(reservation),
        };
        self.notifier.publish(event);
        if let Some(change) = change {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }
        Ok(Some(next))
    }

    /// Drop a hold whose reservation is missing or terminal in storage.
    async fn release_orphaned_hold(
        &self,
        spot_id: &str,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let lock = self.inventory.commit_lock(spot_id)?;
        let _guard = lock.lock().await;

        let storage = self.storage.clone();
        let stored = persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.load_reservation(reservation_id),
            "load_reservation",
        )
        .await?;
        if stored.as_ref().is_some_and(Reservation::is_live) {
            return Ok(false);
        }

        let projected =
            self.inventory
                .projected(spot_id, Projection::Released(reservation_id), now)?;
        self.commit(vec![Mutation::UpsertSpot(projected)], "release_orphaned_hold")
            .await?;
        self.inventory.release(spot_id, reservation_id);
        if let Some(change) = self.inventory.refresh(spot_id, now)? {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }
        warn!(spot_id, reservation_id, "Released hold with no live reservation behind it");
        Ok(true)
    }

    async fn reannounce_spot(&self, spot_id: &str, now: DateTime<Utc>) -> DomainResult<bool> {
        let lock = self.inventory.commit_lock(spot_id)?;
        let _guard = lock.lock().await;

        let projected = self.inventory.projected(spot_id, Projection::Current, now)?;
        if projected.status == self.inventory.spot(spot_id)?.status {
            return Ok(false);
        }
        self.commit(vec![Mutation::UpsertSpot(projected)], "refresh_spot")
            .await?;
        if let Some(change) = self.inventory.refresh(spot_id, now)? {
            self.notifier
                .publish(ReservationEvent::SpotStatusChanged(change));
        }
        Ok(true)
    }

    // ── Storage helpers ────────────────────────────────────────

    async fn commit(&self, mutations: Vec<Mutation>, operation: &str) -> DomainResult<()> {
        let storage = self.storage.clone();
        persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.commit(mutations.clone()),
            operation,
        )
        .await
    }

    async fn load_spot(&self, spot_id: &str) -> DomainResult<Option<ParkingSpot>> {
        let storage = self.storage.clone();
        persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.load_spot(spot_id),
            "load_spot",
        )
        .await
    }

    /// After a failed commit: whether the stored reservation satisfies
    /// `landed`. `None` when storage cannot be read either.
    async fn stored_matches(
        &self,
        reservation_id: &str,
        landed: impl Fn(&Reservation) -> bool,
    ) -> Option<bool> {
        let storage = self.storage.clone();
        let stored = persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.load_reservation(reservation_id),
            "confirm_commit",
        )
        .await;
        match stored {
            Ok(stored) => Some(stored.as_ref().is_some_and(landed)),
            Err(err) => {
                warn!(reservation_id, error = %err, "Cannot confirm commit outcome");
                None
            }
        }
    }

    async fn require_reservation(&self, reservation_id: &str) -> DomainResult<Reservation> {
        let storage = self.storage.clone();
        persist_with_retry(
            &self.settings.retry,
            self.settings.persistence_timeout,
            || storage.load_reservation(reservation_id),
            "load_reservation",
        )
        .await?
        .ok_or_else(|| DomainError::not_found("reservation", reservation_id))
    }
}
