//! Configuration module
//!
//! Application settings are read from a TOML file. Every section is
//! optional; anything missing falls back to its default.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::events::DEFAULT_QUEUE_CAPACITY;
use crate::application::services::{LifecycleConfig, ReservationSettings};
use crate::domain::{DomainResult, ParkingSpot, PricingPolicy, SpotCatalog, SpotStatus, SpotType};
use crate::shared::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default location: `~/.config/parkhub/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parkhub")
        .join("config.toml")
}

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub reservations: ReservationsConfig,
    pub notifications: NotificationsConfig,
    pub pricing: PricingPolicy,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: StorageBackend,
    /// Connection URL, used by the sqlite backend
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            url: "sqlite://./parkhub.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `parkhub=debug,tower_http=info`, ...).
    /// `RUST_LOG` takes precedence.
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationsConfig {
    /// Per-attempt bound on storage calls
    pub persistence_timeout_ms: u64,
    /// Attempts per storage call, first one included
    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub lifecycle_interval_secs: u64,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            persistence_timeout_ms: 2000,
            retry_attempts: 2,
            retry_initial_delay_ms: 50,
            lifecycle_interval_secs: 30,
        }
    }
}

impl ReservationsConfig {
    pub fn settings(&self) -> ReservationSettings {
        ReservationSettings {
            persistence_timeout: Duration::from_millis(self.persistence_timeout_ms),
            retry: RetryConfig {
                max_attempts: self.retry_attempts,
                initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
                ..RetryConfig::default()
            },
        }
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            check_interval_secs: self.lifecycle_interval_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Events buffered per subscriber before it is asked to resync
    pub queue_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Static facility layout, written as `[[catalog.spots]]` tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub spots: Vec<CatalogSpot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSpot {
    pub id: String,
    pub facility_id: String,
    pub spot_number: String,
    pub spot_type: SpotType,
    /// Starts out of service
    #[serde(default)]
    pub disabled: bool,
}

impl CatalogSpot {
    fn to_spot(&self) -> ParkingSpot {
        let mut spot = ParkingSpot::new(
            &self.id,
            &self.facility_id,
            &self.spot_number,
            self.spot_type,
        );
        if self.disabled {
            spot.status = SpotStatus::Disabled;
        }
        spot
    }
}

#[async_trait]
impl SpotCatalog for CatalogConfig {
    async fn spots(&self) -> DomainResult<Vec<ParkingSpot>> {
        Ok(self.spots.iter().map(CatalogSpot::to_spot).collect())
    }
}

impl AppConfig {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pricing
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("pricing: {}", e)))?;

        if self.notifications.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notifications.queue_capacity must be at least 1".into(),
            ));
        }
        if self.reservations.persistence_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "reservations.persistence_timeout_ms must be positive".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut numbers = HashSet::new();
        for spot in &self.catalog.spots {
            if !ids.insert(spot.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate spot id '{}'",
                    spot.id
                )));
            }
            if !numbers.insert((spot.facility_id.as_str(), spot.spot_number.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "spot number '{}' is used twice in facility '{}'",
                    spot.spot_number, spot.facility_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StorageBackend::Sqlite);
        assert_eq!(config.notifications.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.pricing, PricingPolicy::default());
        assert!(config.catalog.spots.is_empty());
    }

    #[test]
    fn partial_pricing_section_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [pricing]
            peak_multiplier = "2"
            "#,
        )
        .unwrap();
        assert_eq!(config.pricing.peak_multiplier, Decimal::from(2));
        assert_eq!(
            config.pricing.base_rates,
            PricingPolicy::default().base_rates
        );
    }

    #[tokio::test]
    async fn catalog_spots_become_parking_spots() {
        let config = AppConfig::from_toml(
            r#"
            [[catalog.spots]]
            id = "A1"
            facility_id = "F1"
            spot_number = "1"
            spot_type = "electric"

            [[catalog.spots]]
            id = "A2"
            facility_id = "F1"
            spot_number = "2"
            spot_type = "compact"
            disabled = true
            "#,
        )
        .unwrap();

        let spots = config.catalog.spots().await.unwrap();
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].spot_type, SpotType::Electric);
        assert_eq!(spots[0].status, SpotStatus::Available);
        assert_eq!(spots[1].status, SpotStatus::Disabled);
    }

    #[test]
    fn duplicate_spot_ids_are_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [[catalog.spots]]
            id = "A1"
            facility_id = "F1"
            spot_number = "1"
            spot_type = "standard"

            [[catalog.spots]]
            id = "A1"
            facility_id = "F1"
            spot_number = "2"
            spot_type = "standard"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let err = AppConfig::from_toml("[notifications]\nqueue_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reservation_settings_follow_config() {
        let config = AppConfig::from_toml(
            "[reservations]\npersistence_timeout_ms = 500\nretry_attempts = 3\n",
        )
        .unwrap();
        let settings = config.reservations.settings();
        assert_eq!(settings.persistence_timeout, Duration::from_millis(500));
        assert_eq!(settings.retry.max_attempts, 3);
    }
}
