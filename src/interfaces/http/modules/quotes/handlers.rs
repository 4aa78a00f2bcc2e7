//! Quote handler

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::dto::{PriceBreakdownDto, QuoteRequest};
use crate::application::ReservationService;
use crate::domain::SpotType;
use crate::interfaces::http::common::{ApiResponse, ApiResult, ValidatedJson};

#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    tag = "Quotes",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Quoted price", body = ApiResponse<PriceBreakdownDto>),
        (status = 400, description = "Invalid window or spot type"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_quote(
    State(service): State<Arc<ReservationService>>,
    ValidatedJson(request): ValidatedJson<QuoteRequest>,
) -> ApiResult<PriceBreakdownDto> {
    let spot_type: SpotType = request.spot_type.parse()?;
    let price = service.quote_price(spot_type, request.start, request.end)?;
    Ok(Json(ApiResponse::success(PriceBreakdownDto::from(&price))))
}
