//! # ParkHub reservation service
//!
//! Parking spot reservations: deterministic pricing, conflict-free spot
//! inventory, durable commits and live change notifications.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: entities (spots, reservations), pricing, events and ports
//! - **application**: inventory, change notifier, reservation orchestration
//! - **infrastructure**: storage adapters (SeaORM/SQLite, in-memory)
//! - **interfaces**: REST API with Swagger docs, notification WebSocket
//! - **shared**: errors, retry, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::{ChangeNotifier, CreateReservation, ReservationService};

// Re-export storage adapters for easy access
pub use infrastructure::{init_database, DatabaseConfig, DatabaseStorage, InMemoryStorage};

// Re-export API router
pub use interfaces::http::create_api_router;
