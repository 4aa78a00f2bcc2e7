//! WebSocket interfaces
//!
//! - `notifications`: live change stream for UI and downstream consumers

pub mod notifications;

pub use notifications::{ws_notifications_handler, NotificationState, SubscriptionQuery};
