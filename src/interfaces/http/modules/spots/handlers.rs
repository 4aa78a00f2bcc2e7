//! Spot HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use super::dto::{OccupancyDto, SpotDto};
use crate::application::ReservationService;
use crate::interfaces::http::common::{ApiResponse, ApiResult};

#[utoipa::path(
    get,
    path = "/api/v1/spots",
    tag = "Spots",
    responses(
        (status = 200, description = "All spots with their current status", body = ApiResponse<Vec<SpotDto>>)
    )
)]
pub async fn list_spots(State(service): State<Arc<ReservationService>>) -> ApiResult<Vec<SpotDto>> {
    let spots = service.list_spots();
    Ok(Json(ApiResponse::success(
        spots.iter().map(SpotDto::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/spots/{spot_id}/disable",
    tag = "Spots",
    params(("spot_id" = String, Path, description = "Spot ID")),
    responses(
        (status = 200, description = "Spot taken out of service", body = ApiResponse<SpotDto>),
        (status = 404, description = "Spot not found")
    )
)]
pub async fn disable_spot(
    State(service): State<Arc<ReservationService>>,
    Path(spot_id): Path<String>,
) -> ApiResult<SpotDto> {
    let spot = service.disable_spot(&spot_id).await?;
    Ok(Json(ApiResponse::success(SpotDto::from(&spot))))
}

#[utoipa::path(
    post,
    path = "/api/v1/spots/{spot_id}/enable",
    tag = "Spots",
    params(("spot_id" = String, Path, description = "Spot ID")),
    responses(
        (status = 200, description = "Spot back in service", body = ApiResponse<SpotDto>),
        (status = 404, description = "Spot not found")
    )
)]
pub async fn enable_spot(
    State(service): State<Arc<ReservationService>>,
    Path(spot_id): Path<String>,
) -> ApiResult<SpotDto> {
    let spot = service.enable_spot(&spot_id).await?;
    Ok(Json(ApiResponse::success(SpotDto::from(&spot))))
}

#[utoipa::path(
    get,
    path = "/api/v1/facilities/{facility_id}/occupancy",
    tag = "Spots",
    params(("facility_id" = String, Path, description = "Facility ID")),
    responses(
        (status = 200, description = "Spot counts by status", body = ApiResponse<OccupancyDto>),
        (status = 404, description = "Facility has no spots")
    )
)]
pub async fn facility_occupancy(
    State(service): State<Arc<ReservationService>>,
    Path(facility_id): Path<String>,
) -> ApiResult<OccupancyDto> {
    let occupancy = service.facility_occupancy(&facility_id)?;
    Ok(Json(ApiResponse::success(OccupancyDto::from(&occupancy))))
}
