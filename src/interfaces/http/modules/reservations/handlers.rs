//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::dto::*;
use crate::application::{CreateReservation, ReservationService};
use crate::domain::{PaymentConfirmation, PaymentMethod, SpotType, VehicleInfo};
use crate::interfaces::http::common::{
    ApiError, ApiResponse, ApiResult, RequesterId, ValidatedJson,
};

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Invalid window or spot type"),
        (status = 401, description = "Missing X-User-Id"),
        (status = 404, description = "Unknown spot"),
        (status = 409, description = "Overlapping reservation or spot disabled"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_reservation(
    State(service): State<Arc<ReservationService>>,
    RequesterId(user_id): RequesterId,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError> {
    let spot_type: SpotType = request.spot_type.parse()?;
    let reservation = service
        .create_reservation(CreateReservation {
            spot_id: request.spot_id,
            user_id,
            spot_type,
            start: request.start,
            end: request.end,
            vehicle: VehicleInfo {
                plate: request.vehicle_plate,
                description: request.vehicle_description,
            },
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ReservationDto::from(&reservation))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Requester's reservations, newest first", body = ApiResponse<Vec<ReservationDto>>),
        (status = 401, description = "Missing X-User-Id")
    )
)]
pub async fn list_reservations(
    State(service): State<Arc<ReservationService>>,
    RequesterId(user_id): RequesterId,
) -> ApiResult<Vec<ReservationDto>> {
    let reservations = service.list_reservations(&user_id).await?;
    Ok(Json(ApiResponse::success(
        reservations.iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    params(
        ("reservation_id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(service): State<Arc<ReservationService>>,
    RequesterId(user_id): RequesterId,
    Path(reservation_id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = service.get_reservation(&reservation_id, &user_id).await?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{reservation_id}",
    tag = "Reservations",
    params(
        ("reservation_id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Already cancelled or completed")
    )
)]
pub async fn cancel_reservation(
    State(service): State<Arc<ReservationService>>,
    RequesterId(user_id): RequesterId,
    Path(reservation_id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = service
        .cancel_reservation(&reservation_id, &user_id)
        .await?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{reservation_id}/payment",
    tag = "Reservations",
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    request_body = RecordPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Unknown payment method"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "A different payment is already recorded")
    )
)]
pub async fn record_payment(
    State(service): State<Arc<ReservationService>>,
    Path(reservation_id): Path<String>,
    ValidatedJson(request): ValidatedJson<RecordPaymentRequest>,
) -> ApiResult<ReservationDto> {
    let method: PaymentMethod = request.method.parse()?;
    let payment = PaymentConfirmation {
        method,
        reference: request.reference,
        paid_at: request.paid_at.unwrap_or_else(|| service.now()),
    };
    let reservation = service.mark_paid(&reservation_id, payment).await?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}
