//! Parking spot domain entity

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::reservation::TimeWindow;
use crate::shared::errors::DomainError;

/// Physical kind of a spot; drives the hourly base rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotType {
    Standard,
    Compact,
    Accessible,
    Electric,
}

impl SpotType {
    pub const ALL: [SpotType; 4] = [
        SpotType::Standard,
        SpotType::Compact,
        SpotType::Accessible,
        SpotType::Electric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
            Self::Accessible => "accessible",
            Self::Electric => "electric",
        }
    }
}

impl FromStr for SpotType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "compact" => Ok(Self::Compact),
            "accessible" => Ok(Self::Accessible),
            "electric" => Ok(Self::Electric),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown spot type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SpotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spot status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    #[default]
    Available,
    /// At least one upcoming reservation holds the spot
    Reserved,
    /// A reservation window covers the current time
    Occupied,
    /// Out of service for maintenance
    Disabled,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Occupied => "occupied",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for SpotStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "occupied" => Ok(Self::Occupied),
            "disabled" => Ok(Self::Disabled),
            other => Err(DomainError::Persistence(format!(
                "unknown spot status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reservable parking space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: String,
    pub facility_id: String,
    /// Number painted on the ground, unique within a facility
    pub spot_number: String,
    pub spot_type: SpotType,
    #[serde(default)]
    pub status: SpotStatus,
}

impl ParkingSpot {
    pub fn new(
        id: impl Into<String>,
        facility_id: impl Into<String>,
        spot_number: impl Into<String>,
        spot_type: SpotType,
    ) -> Self {
        Self {
            id: id.into(),
            facility_id: facility_id.into(),
            spot_number: spot_number.into(),
            spot_type,
            status: SpotStatus::Available,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.status == SpotStatus::Disabled
    }
}

/// Status implied by the live reservation windows holding a spot.
pub fn derive_status<'a>(
    disabled: bool,
    live_windows: impl IntoIterator<Item = &'a TimeWindow>,
    now: DateTime<Utc>,
) -> SpotStatus {
    if disabled {
        return SpotStatus::Disabled;
    }
    let mut held = false;
    for window in live_windows {
        if window.contains(now) {
            return SpotStatus::Occupied;
        }
        held = true;
    }
    if held {
        SpotStatus::Reserved
    } else {
        SpotStatus::Available
    }
}

/// Non-available spot counts for one facility
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub facility_id: String,
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub occupied: u32,
    pub disabled: u32,
}

impl Occupancy {
    pub fn new(facility_id: impl Into<String>) -> Self {
        Self {
            facility_id: facility_id.into(),
            ..Self::default()
        }
    }

    pub fn count(&mut self, status: SpotStatus) {
        self.total += 1;
        match status {
            SpotStatus::Available => self.available += 1,
            SpotStatus::Reserved => self.reserved += 1,
            SpotStatus::Occupied => self.occupied += 1,
            SpotStatus::Disabled => self.disabled += 1,
        }
    }

    /// Spots that cannot be booked right now
    pub fn non_available(&self) -> u32 {
        self.total - self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_type_parses_case_insensitively() {
        assert_eq!("Electric".parse::<SpotType>().unwrap(), SpotType::Electric);
        assert!("bus".parse::<SpotType>().is_err());
    }

    #[test]
    fn status_display_matches_storage_form() {
        for status in [
            SpotStatus::Available,
            SpotStatus::Reserved,
            SpotStatus::Occupied,
            SpotStatus::Disabled,
        ] {
            assert_eq!(status.to_string().parse::<SpotStatus>().unwrap(), status);
        }
    }

    #[test]
    fn occupancy_counts_non_available() {
        let mut occ = Occupancy::new("F1");
        occ.count(SpotStatus::Available);
        occ.count(SpotStatus::Reserved);
        occ.count(SpotStatus::Occupied);
        occ.count(SpotStatus::Disabled);
        assert_eq!(occ.total, 4);
        assert_eq!(occ.non_available(), 3);
    }

    #[test]
    fn derived_status_follows_live_windows() {
        use chrono::TimeZone;
        let at = |h| Utc.with_ymd_and_hms(2030, 6, 1, h, 0, 0).unwrap();
        let window = TimeWindow::resolve(at(10), at(12)).unwrap();

        assert_eq!(
            derive_status(false, Vec::<&TimeWindow>::new(), at(9)),
            SpotStatus::Available
        );
        assert_eq!(derive_status(false, [&window], at(9)), SpotStatus::Reserved);
        assert_eq!(derive_status(false, [&window], at(11)), SpotStatus::Occupied);
        assert_eq!(derive_status(true, [&window], at(11)), SpotStatus::Disabled);
    }

    #[test]
    fn new_spot_is_available() {
        let spot = ParkingSpot::new("A1", "F1", "1", SpotType::Compact);
        assert_eq!(spot.status, SpotStatus::Available);
        assert!(!spot.is_disabled());
    }
}
