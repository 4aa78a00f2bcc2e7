//! Quote DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::PriceBreakdown;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    /// `standard`, `compact`, `accessible` or `electric`
    #[validate(length(min = 1))]
    #[schema(example = "standard")]
    pub spot_type: String,
    pub start: DateTime<Utc>,
    /// An end before `start` is read as the next day
    pub end: DateTime<Utc>,
}

/// Price breakdown. Decimal factors are rendered as strings to keep them exact.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdownDto {
    pub spot_type: String,
    #[schema(example = "50")]
    pub base_price: String,
    #[schema(example = "2")]
    pub duration_hours: String,
    #[schema(example = "1.5")]
    pub multiplier: String,
    #[schema(example = "1")]
    pub discount_factor: String,
    #[schema(example = 150)]
    pub final_price: i64,
}

impl From<&PriceBreakdown> for PriceBreakdownDto {
    fn from(p: &PriceBreakdown) -> Self {
        Self {
            spot_type: p.spot_type.to_string(),
            base_price: p.base_price.to_string(),
            duration_hours: p.duration_hours.to_string(),
            multiplier: p.multiplier.to_string(),
            discount_factor: p.discount_factor.to_string(),
            final_price: p.final_price,
        }
    }
}
