//! Facility catalog port

use async_trait::async_trait;

use super::model::ParkingSpot;
use crate::domain::DomainResult;

/// Static spot definitions supplied by the facility/catalog collaborator.
/// Read once at startup; the inventory never writes back to it.
#[async_trait]
pub trait SpotCatalog: Send + Sync {
    async fn spots(&self) -> DomainResult<Vec<ParkingSpot>>;
}

/// Catalog backed by a fixed list (configuration file, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    spots: Vec<ParkingSpot>,
}

impl StaticCatalog {
    pub fn new(spots: Vec<ParkingSpot>) -> Self {
        Self { spots }
    }
}

#[async_trait]
impl SpotCatalog for StaticCatalog {
    async fn spots(&self) -> DomainResult<Vec<ParkingSpot>> {
        Ok(self.spots.clone())
    }
}
