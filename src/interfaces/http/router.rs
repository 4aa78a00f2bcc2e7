//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::common::ApiResponse;
use super::modules::health::{self, HealthState};
use super::modules::metrics::{self, MetricsState};
use super::modules::quotes::{self, PriceBreakdownDto, QuoteRequest};
use super::modules::request_id::request_id_middleware;
use super::modules::reservations::{
    self, CreateReservationRequest, PaymentDto, RecordPaymentRequest, ReservationDto,
};
use super::modules::spots::{self, OccupancyDto, SpotDto};
use crate::application::ReservationService;
use crate::interfaces::ws::{ws_notifications_handler, NotificationState};
use crate::shared::shutdown::ShutdownSignal;

/// State shared by every route; handlers extract their slice via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService>,
    pub started_at: Arc<Instant>,
    pub shutdown: ShutdownSignal,
}

impl AppState {
    pub fn new(service: Arc<ReservationService>, shutdown: ShutdownSignal) -> Self {
        Self {
            service,
            started_at: Arc::new(Instant::now()),
            shutdown,
        }
    }
}

impl FromRef<AppState> for Arc<ReservationService> {
    fn from_ref(s: &AppState) -> Self {
        Arc::clone(&s.service)
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(s: &AppState) -> Self {
        HealthState {
            service: Arc::clone(&s.service),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<AppState> for NotificationState {
    fn from_ref(s: &AppState) -> Self {
        NotificationState {
            service: Arc::clone(&s.service),
            shutdown: s.shutdown.clone(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        quotes::create_quote,
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::cancel_reservation,
        reservations::record_payment,
        spots::list_spots,
        spots::disable_spot,
        spots::enable_spot,
        spots::facility_occupancy,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            health::ComponentHealth,
            QuoteRequest,
            PriceBreakdownDto,
            CreateReservationRequest,
            RecordPaymentRequest,
            ReservationDto,
            PaymentDto,
            SpotDto,
            OccupancyDto,
        )
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Quotes", description = "Price quotes for prospective bookings"),
        (name = "Reservations", description = "Booking, cancellation and payment recording"),
        (name = "Spots", description = "Spot status, maintenance and facility occupancy"),
    ),
    info(
        title = "ParkHub Reservation API",
        version = "1.0.0",
        description = "Parking spot reservations with live change notifications. \
                       Live updates: `GET /api/v1/notifications/ws`."
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes. `/metrics` is only mounted when a
/// Prometheus handle is available.
pub fn create_api_router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let service = Arc::clone(&state.service);

    let reservation_routes = Router::new()
        .route(
            "/",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route(
            "/{reservation_id}",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route(
            "/{reservation_id}/payment",
            post(reservations::record_payment),
        );

    let spot_routes = Router::new()
        .route("/", get(spots::list_spots))
        .route("/{spot_id}/disable", post(spots::disable_spot))
        .route("/{spot_id}/enable", post(spots::enable_spot));

    let api_routes = Router::new()
        .route("/quotes", post(quotes::create_quote))
        .nest("/reservations", reservation_routes)
        .nest("/spots", spot_routes)
        .route(
            "/facilities/{facility_id}/occupancy",
            get(spots::facility_occupancy),
        )
        .route("/notifications/ws", get(ws_notifications_handler));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .merge(swagger_routes);

    if let Some(handle) = prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(MetricsState { handle, service }),
        );
    }

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ChangeNotifier;
    use crate::domain::{ManualClock, ParkingSpot, PricingPolicy, SpotType, StaticCatalog};
    use crate::infrastructure::InMemoryStorage;
    use crate::interfaces::http::common::USER_ID_HEADER;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::Service;

    async fn app() -> Router {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2030, 6, 1, 7, 0, 0).unwrap(),
        ));
        let service = Arc::new(
            ReservationService::new(
                Arc::new(InMemoryStorage::new()),
                PricingPolicy::default(),
                Arc::new(ChangeNotifier::new()),
            )
            .with_clock(clock),
        );
        service
            .recover(&StaticCatalog::new(vec![
                ParkingSpot::new("A", "F1", "1", SpotType::Standard),
                ParkingSpot::new("B", "F1", "2", SpotType::Electric),
            ]))
            .await
            .unwrap();
        create_api_router(AppState::new(service, ShutdownSignal::new()), None)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let mut svc = router.clone().into_service();
        let resp = svc.call(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn booking(spot: &str, spot_type: &str, start: &str, end: &str) -> Value {
        serde_json::json!({
            "spot_id": spot,
            "spot_type": spot_type,
            "start": start,
            "end": end,
            "vehicle_plate": "KA01AB1234"
        })
    }

    #[tokio::test]
    async fn quote_endpoint_prices_peak_booking() {
        let router = app().await;
        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/quotes",
                None,
                serde_json::json!({
                    "spot_type": "standard",
                    "start": "2030-06-01T09:00:00Z",
                    "end": "2030-06-01T11:00:00Z"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["final_price"], 150);
    }

    #[tokio::test]
    async fn unknown_spot_type_is_bad_request() {
        let router = app().await;
        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/quotes",
                None,
                serde_json::json!({
                    "spot_type": "truck",
                    "start": "2030-06-01T09:00:00Z",
                    "end": "2030-06-01T11:00:00Z"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn booking_requires_user_header() {
        let router = app().await;
        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                None,
                booking("A", "standard", "2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn overlapping_booking_is_conflict() {
        let router = app().await;
        let (status, body) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                Some("alice"),
                booking("A", "standard", "2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "upcoming");

        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                Some("bob"),
                booking("A", "standard", "2030-06-01T11:00:00Z", "2030-06-01T13:00:00Z"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn only_owner_may_cancel() {
        let router = app().await;
        let (_, body) = send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                Some("alice"),
                booking("B", "electric", "2030-06-01T14:00:00Z", "2030-06-01T20:00:00Z"),
            ),
        )
        .await;
        assert_eq!(body["data"]["price"]["final_price"], 360);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/reservations/{}", id);

        let (status, _) = send(&router, empty_request("DELETE", &uri, Some("bob"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, empty_request("DELETE", &uri, Some("alice"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "cancelled");

        let (status, _) = send(&router, empty_request("DELETE", &uri, Some("alice"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn occupancy_reflects_reservations_and_maintenance() {
        let router = app().await;
        send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                Some("alice"),
                booking("A", "standard", "2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z"),
            ),
        )
        .await;
        let (status, _) = send(&router, empty_request("POST", "/api/v1/spots/B/disable", None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            empty_request("GET", "/api/v1/facilities/F1/occupancy", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["reserved"], 1);
        assert_eq!(body["data"]["disabled"], 1);
        assert_eq!(body["data"]["non_available"], 2);

        let (status, _) = send(
            &router,
            empty_request("GET", "/api/v1/facilities/nowhere/occupancy", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_only_own_reservations() {
        let router = app().await;
        send(
            &router,
            json_request(
                "POST",
                "/api/v1/reservations",
                Some("alice"),
                booking("A", "standard", "2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z"),
            ),
        )
        .await;
        let (status, body) = send(
            &router,
            empty_request("GET", "/api/v1/reservations", Some("bob")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let (_, body) = send(
            &router,
            empty_request("GET", "/api/v1/reservations", Some("alice")),
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = app().await;
        let (status, body) = send(&router, empty_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["spots"], 2);
    }
}
