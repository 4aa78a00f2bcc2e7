//! Application events (pub/sub)
//!
//! Event types are defined in `domain::events`. The `ChangeNotifier`
//! (per-subscriber bounded queues) lives here in the application layer.

pub mod notifier;

pub use notifier::{
    ChangeNotifier, Delivery, EventFilter, Subscription, SubscriptionId, DEFAULT_QUEUE_CAPACITY,
};
