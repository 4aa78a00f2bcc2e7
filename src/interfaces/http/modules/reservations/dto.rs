//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{PaymentConfirmation, Reservation};
use crate::interfaces::http::modules::quotes::PriceBreakdownDto;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, max = 64))]
    pub spot_id: String,
    /// Must match the spot's type
    #[validate(length(min = 1))]
    #[schema(example = "standard")]
    pub spot_type: String,
    pub start: DateTime<Utc>,
    /// An end before `start` is read as the next day
    pub end: DateTime<Utc>,
    #[validate(length(min = 1, max = 16))]
    #[schema(example = "KA01AB1234")]
    pub vehicle_plate: String,
    #[validate(length(max = 128))]
    pub vehicle_description: Option<String>,
}

/// Sent by the payment collaborator after a successful charge
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordPaymentRequest {
    /// `card`, `upi`, `net_banking` or `wallet`
    #[validate(length(min = 1))]
    #[schema(example = "card")]
    pub method: String,
    #[validate(length(min = 1, max = 128))]
    pub reference: String,
    /// Defaults to the time the request is processed
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentDto {
    pub method: String,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

impl From<&PaymentConfirmation> for PaymentDto {
    fn from(p: &PaymentConfirmation) -> Self {
        Self {
            method: p.method.as_str().to_string(),
            reference: p.reference.clone(),
            paid_at: p.paid_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub spot_id: String,
    pub user_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub unit_type: String,
    /// `upcoming`, `active`, `completed` or `cancelled`
    pub status: String,
    pub price: PriceBreakdownDto,
    pub vehicle_plate: String,
    pub vehicle_description: Option<String>,
    pub payment: Option<PaymentDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationDto {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id.clone(),
            spot_id: r.spot_id.clone(),
            user_id: r.user_id.clone(),
            start: r.window.start,
            end: r.window.end,
            unit_type: r.unit_type.to_string(),
            status: r.status.to_string(),
            price: PriceBreakdownDto::from(&r.price),
            vehicle_plate: r.vehicle.plate.clone(),
            vehicle_description: r.vehicle.description.clone(),
            payment: r.payment.as_ref().map(PaymentDto::from),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
