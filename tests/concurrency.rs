//! Concurrent booking behaviour: no double booking, single cancellation.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parkhub::application::{
    ChangeNotifier, CreateReservation, Delivery, EventFilter, ReservationService,
};
use parkhub::domain::{
    DomainError, ManualClock, ParkingSpot, PricingPolicy, Reservation, SpotType, StaticCatalog,
    VehicleInfo,
};
use parkhub::InMemoryStorage;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, hour, 0, 0).unwrap()
}

async fn service(queue_capacity: usize) -> Arc<ReservationService> {
    let service = ReservationService::new(
        Arc::new(InMemoryStorage::new()),
        PricingPolicy::default(),
        Arc::new(ChangeNotifier::with_capacity(queue_capacity)),
    )
    .with_clock(Arc::new(ManualClock::new(at(6))));
    service
        .recover(&StaticCatalog::new(vec![
            ParkingSpot::new("A", "F1", "1", SpotType::Standard),
            ParkingSpot::new("B", "F1", "2", SpotType::Standard),
        ]))
        .await
        .unwrap();
    Arc::new(service)
}

fn booking(
    user: String,
    spot: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CreateReservation {
    CreateReservation {
        spot_id: spot.into(),
        user_id: user,
        spot_type: SpotType::Standard,
        start,
        end,
        vehicle: VehicleInfo {
            plate: "DL3CAB0001".into(),
            description: None,
        },
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identical_concurrent_bookings_admit_exactly_one() {
    let service = service(256).await;

    let mut tasks = Vec::new();
    for i in 0..2 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .create_reservation(booking(format!("user-{}", i), "A", at(10), at(12)))
                .await
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(DomainError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
    assert_eq!((ok, conflicts), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_tasks_never_double_book() {
    let service = service(1024).await;

    // Staggered windows of 1-3 hours starting every 30 minutes across two spots
    let mut tasks = Vec::new();
    for i in 0..48u32 {
        let service = service.clone();
        let spot = if i % 2 == 0 { "A" } else { "B" };
        let start = at(8) + Duration::minutes(30 * (i as i64 % 16));
        let end = start + Duration::hours(1 + (i as i64 % 3));
        tasks.push(tokio::spawn(async move {
            service
                .create_reservation(booking(format!("user-{}", i), spot, start, end))
                .await
        }));
    }

    let mut accepted: Vec<Reservation> = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(reservation) => accepted.push(reservation),
            Err(DomainError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
    assert!(!accepted.is_empty());

    for (i, a) in accepted.iter().enumerate() {
        for b in accepted.iter().skip(i + 1) {
            if a.spot_id == b.spot_id {
                assert!(
                    !a.window.overlaps(&b.window),
                    "{} and {} overlap on spot {}",
                    a.id,
                    b.id,
                    a.spot_id
                );
            }
        }
    }

    let holds = service.inventory().hold_count("A") + service.inventory().hold_count("B");
    assert_eq!(holds, accepted.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_release_once() {
    let service = service(256).await;
    let reservation = service
        .create_reservation(booking("owner".into(), "A", at(10), at(12)))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let service = service.clone();
        let id = reservation.id.clone();
        tasks.push(tokio::spawn(async move {
            service.cancel_reservation(&id, "owner").await
        }));
    }

    let mut ok = 0;
    let mut already = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(DomainError::AlreadyCancelled(_)) => already += 1,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
    assert_eq!((ok, already), (1, 1));
    assert_eq!(service.inventory().hold_count("A"), 0);
}

#[tokio::test]
async fn slow_subscriber_is_told_to_resync() {
    let service = service(2).await;
    let mut slow = service.subscribe(EventFilter::default());

    for hour in [8, 10, 12] {
        service
            .create_reservation(booking("u".into(), "A", at(hour), at(hour + 1)))
            .await
            .unwrap();
    }

    // Three creates publish at least four events into a queue of two:
    // the queued ones arrive first, then the request to re-query
    for expected in [1, 2] {
        match slow.recv().await {
            Some(Delivery::Event(message)) => assert_eq!(message.sequence, expected),
            other => panic!("expected queued event, got {:?}", other),
        }
    }
    match slow.recv().await {
        Some(Delivery::Resync { missed }) => assert!(missed >= 2),
        other => panic!("expected resync, got {:?}", other),
    }
    assert!(slow.try_recv().is_none());
}
