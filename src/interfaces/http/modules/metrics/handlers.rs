//! `GET /metrics`
//!
//! Counters and histograms accumulate as requests and commits happen.
//! Inventory and subscriber gauges are sampled from the service on each
//! scrape, so they always match `GET /api/v1/spots`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::ReservationService;
use crate::domain::SpotStatus;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub service: Arc<ReservationService>,
}

pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    record_inventory_gauges(&state.service);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_TEXT)],
        state.handle.render(),
    )
}

/// `parking_spots{status}`, `notification_subscribers` and
/// `notification_last_sequence`
fn record_inventory_gauges(service: &ReservationService) {
    let spots = service.list_spots();
    for status in [
        SpotStatus::Available,
        SpotStatus::Reserved,
        SpotStatus::Occupied,
        SpotStatus::Disabled,
    ] {
        let count = spots.iter().filter(|s| s.status == status).count();
        metrics::gauge!("parking_spots", "status" => status.as_str()).set(count as f64);
    }

    let notifier = service.notifier();
    metrics::gauge!("notification_subscribers").set(notifier.subscriber_count() as f64);
    metrics::gauge!("notification_last_sequence").set(notifier.last_sequence() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ChangeNotifier;
    use crate::domain::{ParkingSpot, PricingPolicy, SpotType, StaticCatalog};
    use crate::infrastructure::InMemoryStorage;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[tokio::test]
    async fn gauges_follow_spot_inventory() {
        let service = ReservationService::new(
            Arc::new(InMemoryStorage::new()),
            PricingPolicy::default(),
            Arc::new(ChangeNotifier::new()),
        );
        service
            .recover(&StaticCatalog::new(vec![
                ParkingSpot::new("A", "F1", "1", SpotType::Standard),
                ParkingSpot::new("B", "F1", "2", SpotType::Compact),
            ]))
            .await
            .unwrap();
        service.disable_spot("B").await.unwrap();
        let _sub = service.subscribe(Default::default());

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || record_inventory_gauges(&service));

        let text = handle.render();
        assert!(text.contains("parking_spots{status=\"available\"} 1"));
        assert!(text.contains("parking_spots{status=\"disabled\"} 1"));
        assert!(text.contains("parking_spots{status=\"occupied\"} 0"));
        assert!(text.contains("notification_subscribers 1"));
    }
}
