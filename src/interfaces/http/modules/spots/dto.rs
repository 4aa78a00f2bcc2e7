//! Spot DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Occupancy, ParkingSpot};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SpotDto {
    pub id: String,
    pub facility_id: String,
    pub spot_number: String,
    pub spot_type: String,
    /// `available`, `reserved`, `occupied` or `disabled`
    pub status: String,
}

impl From<&ParkingSpot> for SpotDto {
    fn from(s: &ParkingSpot) -> Self {
        Self {
            id: s.id.clone(),
            facility_id: s.facility_id.clone(),
            spot_number: s.spot_number.clone(),
            spot_type: s.spot_type.to_string(),
            status: s.status.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OccupancyDto {
    pub facility_id: String,
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub occupied: u32,
    pub disabled: u32,
    /// Spots that cannot be booked right now
    pub non_available: u32,
}

impl From<&Occupancy> for OccupancyDto {
    fn from(o: &Occupancy) -> Self {
        Self {
            facility_id: o.facility_id.clone(),
            total: o.total,
            available: o.available,
            reserved: o.reserved,
            occupied: o.occupied,
            disabled: o.disabled,
            non_available: o.non_available(),
        }
    }
}
