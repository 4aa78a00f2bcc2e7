//! Change notifier for broadcasting committed changes to subscribers
//!
//! Each subscriber owns a bounded queue. Publishing never blocks: when a
//! queue is full the event is dropped for that subscriber only and its
//! missed counter grows. Once the events already queued are drained, the
//! subscriber's next `recv` asks it to resync, so the re-queried state is
//! never followed by older events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{EventMessage, ReservationEvent};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub type SubscriptionId = u64;

/// Which events a subscriber wants. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventFilter {
    pub spot_id: Option<String>,
    pub reservation_id: Option<String>,
    pub user_id: Option<String>,
    /// Event type names as produced by `ReservationEvent::event_type`
    #[serde(default)]
    pub event_types: Vec<String>,
}

impl EventFilter {
    pub fn for_spot(spot_id: impl Into<String>) -> Self {
        Self {
            spot_id: Some(spot_id.into()),
            ..Self::default()
        }
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &ReservationEvent) -> bool {
        if let Some(spot_id) = &self.spot_id {
            if event.spot_id() != spot_id {
                return false;
            }
        }
        if let Some(reservation_id) = &self.reservation_id {
            if event.reservation_id() != Some(reservation_id.as_str()) {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id() != Some(user_id.as_str()) {
                return false;
            }
        }
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event.event_type())
    }
}

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(EventMessage),
    /// Events were dropped for this subscriber; re-query current state.
    /// Every event received after this one is newer than the re-query.
    Resync { missed: u64 },
}

struct SubscriberSlot {
    filter: EventFilter,
    tx: mpsc::Sender<EventMessage>,
    missed: Arc<AtomicU64>,
}

type Subscribers = Arc<DashMap<SubscriptionId, SubscriberSlot>>;

/// Filtered, bounded pub/sub for committed changes
pub struct ChangeNotifier {
    subscribers: Subscribers,
    next_id: AtomicU64,
    sequence: AtomicU64,
    capacity: usize,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// `capacity` is the per-subscriber queue length
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            sequence: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Fan an event out to every matching subscriber. Returns its sequence.
    pub fn publish(&self, event: ReservationEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let message = EventMessage::new(event, sequence);
        let event_type = message.event.event_type();

        let mut delivered = 0usize;
        let mut closed = Vec::new();

        for slot in self.subscribers.iter() {
            if !slot.filter.matches(&message.event) {
                continue;
            }
            match slot.tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let missed = slot.missed.fetch_add(1, Ordering::SeqCst) + 1;
                    metrics::counter!("notifier_dropped_events_total").increment(1);
                    warn!(
                        subscriber = *slot.key(),
                        event_type,
                        missed,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*slot.key()),
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            debug!(subscriber = id, "Pruned closed subscriber");
        }

        debug!(
            event_type,
            sequence,
            entity_id = %message.entity_id,
            subscribers = delivered,
            "Event published"
        );
        sequence
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.capacity);
        let missed = Arc::new(AtomicU64::new(0));

        self.subscribers.insert(
            id,
            SubscriberSlot {
                filter,
                tx,
                missed: missed.clone(),
            },
        );
        info!(subscriber = id, total = self.subscribers.len(), "New event subscriber");

        Subscription {
            id,
            rx,
            missed,
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Last sequence handed out
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Disconnect every subscriber; their `recv` returns `None` once drained.
    pub fn close_all(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        info!(count, "All event subscribers closed");
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<EventMessage>,
    missed: Arc<AtomicU64>,
    subscribers: Subscribers,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next delivery, or `None` after the notifier closed this subscription.
    pub async fn recv(&mut self) -> Option<Delivery> {
        if let Some(delivery) = self.try_recv() {
            return Some(delivery);
        }
        // Queue empty: nothing can be dropped until it fills again
        self.rx.recv().await.map(Delivery::Event)
    }

    /// Non-blocking variant of `recv`
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.rx.try_recv() {
            Ok(message) => Some(Delivery::Event(message)),
            Err(_) => self.take_resync(),
        }
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn take_resync(&mut self) -> Option<Delivery> {
        match self.missed.swap(0, Ordering::SeqCst) {
            0 => None,
            missed => Some(Delivery::Resync { missed }),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.subscribers.remove(&self.id).is_some() {
            info!(subscriber = self.id, "Event subscriber disconnected");
        }
    }
}
