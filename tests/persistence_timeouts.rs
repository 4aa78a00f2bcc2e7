//! Commits that land but acknowledge after the persistence timeout.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parkhub::application::{
    ChangeNotifier, CreateReservation, ReservationService, ReservationSettings,
};
use parkhub::domain::{
    DomainError, DomainResult, ManualClock, Mutation, ParkingSpot, PersistenceAdapter,
    PricingPolicy, Reservation, SpotStatus, SpotType, StaticCatalog, VehicleInfo,
};
use parkhub::shared::retry::RetryConfig;
use parkhub::InMemoryStorage;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, hour, 0, 0).unwrap()
}

/// Applies every commit, then sleeps past the caller's timeout for the
/// next `stalls` commits.
struct LateAckStorage {
    inner: InMemoryStorage,
    stalls: AtomicU32,
}

impl LateAckStorage {
    fn new() -> Self {
        Self {
            inner: InMemoryStorage::new(),
            stalls: AtomicU32::new(0),
        }
    }

    fn stall_next(&self, count: u32) {
        self.stalls.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceAdapter for LateAckStorage {
    async fn load_spot(&self, id: &str) -> DomainResult<Option<ParkingSpot>> {
        self.inner.load_spot(id).await
    }

    async fn list_spots(&self) -> DomainResult<Vec<ParkingSpot>> {
        self.inner.list_spots().await
    }

    async fn load_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
        self.inner.load_reservation(id).await
    }

    async fn list_reservations_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        self.inner.list_reservations_for_user(user_id).await
    }

    async fn list_live_reservations(&self) -> DomainResult<Vec<Reservation>> {
        self.inner.list_live_reservations().await
    }

    async fn commit(&self, mutations: Vec<Mutation>) -> DomainResult<()> {
        self.inner.commit(mutations).await?;
        let stalled = self
            .stalls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(())
    }
}

async fn service(storage: Arc<LateAckStorage>) -> ReservationService {
    let service = ReservationService::new(
        storage,
        PricingPolicy::default(),
        Arc::new(ChangeNotifier::new()),
    )
    .with_clock(Arc::new(ManualClock::new(at(7))))
    .with_settings(ReservationSettings {
        persistence_timeout: Duration::from_millis(50),
        retry: RetryConfig {
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        },
    });
    service
        .recover(&StaticCatalog::new(vec![ParkingSpot::new(
            "A",
            "F1",
            "1",
            SpotType::Standard,
        )]))
        .await
        .unwrap();
    service
}

fn booking(user: &str, start: u32, end: u32) -> CreateReservation {
    CreateReservation {
        spot_id: "A".into(),
        user_id: user.into(),
        spot_type: SpotType::Standard,
        start: at(start),
        end: at(end),
        vehicle: VehicleInfo {
            plate: "TN09CD4321".into(),
            description: None,
        },
    }
}

#[tokio::test]
async fn late_create_ack_never_allows_an_overlapping_booking() {
    let storage = Arc::new(LateAckStorage::new());
    let service = service(storage.clone()).await;

    storage.stall_next(1);
    let first = service.create_reservation(booking("u1", 10, 12)).await.unwrap();

    assert!(matches!(
        service.create_reservation(booking("u2", 11, 13)).await,
        Err(DomainError::Conflict { .. })
    ));
    let live = storage.list_live_reservations().await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, first.id);
}

#[tokio::test]
async fn late_cancel_ack_frees_the_spot() {
    let storage = Arc::new(LateAckStorage::new());
    let service = service(storage.clone()).await;
    let r = service.create_reservation(booking("u1", 10, 12)).await.unwrap();

    storage.stall_next(1);
    service.cancel_reservation(&r.id, "u1").await.unwrap();

    assert_eq!(service.inventory().hold_count("A"), 0);
    assert_eq!(
        storage.load_spot("A").await.unwrap().unwrap().status,
        SpotStatus::Available
    );
    assert!(service.create_reservation(booking("u2", 11, 13)).await.is_ok());
    assert!(matches!(
        service.cancel_reservation(&r.id, "u1").await,
        Err(DomainError::AlreadyCancelled(_))
    ));
}
