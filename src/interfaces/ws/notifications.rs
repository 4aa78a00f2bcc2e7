//! WebSocket change stream
//!
//! Each connection owns one notifier subscription. Events are sent as JSON
//! text frames. A subscriber that fell behind gets a
//! `{"type":"resync","missed":n}` frame after its queued events and should
//! then re-query current state.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::application::events::{Delivery, EventFilter};
use crate::application::ReservationService;
use crate::shared::shutdown::ShutdownSignal;

/// Query parameters of `GET /api/v1/notifications/ws`
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub spot_id: Option<String>,
    pub reservation_id: Option<String>,
    pub user_id: Option<String>,
    /// Comma-separated event types, e.g. `reservation_created,spot_status_changed`
    pub event_types: Option<String>,
}

impl From<SubscriptionQuery> for EventFilter {
    fn from(q: SubscriptionQuery) -> Self {
        EventFilter {
            spot_id: q.spot_id,
            reservation_id: q.reservation_id,
            user_id: q.user_id,
            event_types: q
                .event_types
                .map(|types| {
                    types
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationState {
    pub service: Arc<ReservationService>,
    pub shutdown: ShutdownSignal,
}

pub async fn ws_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<NotificationState>,
    Query(query): Query<SubscriptionQuery>,
) -> impl IntoResponse {
    let filter = EventFilter::from(query);
    info!(
        spot_id = ?filter.spot_id,
        user_id = ?filter.user_id,
        event_types = ?filter.event_types,
        "New notification WebSocket connection"
    );
    ws.on_upgrade(move |socket| handle_notification_socket(socket, state, filter))
}

fn frame_for(delivery: &Delivery) -> Result<String, serde_json::Error> {
    match delivery {
        Delivery::Event(message) => serde_json::to_string(message),
        Delivery::Resync { missed } => Ok(serde_json::json!({
            "type": "resync",
            "missed": missed,
        })
        .to_string()),
    }
}

async fn handle_notification_socket(
    socket: WebSocket,
    state: NotificationState,
    filter: EventFilter,
) {
    let (mut sender, mut receiver) = socket.split();
    let welcome = serde_json::json!({
        "type": "connected",
        "filter": {
            "spot_id": filter.spot_id,
            "reservation_id": filter.reservation_id,
            "user_id": filter.user_id,
            "event_types": filter.event_types,
        },
        "last_sequence": state.service.notifier().last_sequence(),
    });
    let mut subscription = state.service.subscribe(filter);

    if let Err(e) = sender.send(Message::Text(welcome.to_string().into())).await {
        error!(error = %e, "Failed to send welcome message");
        return;
    }

    loop {
        select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed notification stream");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            delivery = subscription.recv() => {
                let Some(delivery) = delivery else {
                    info!("Notifier closed the subscription");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                match frame_for(&delivery) {
                    Ok(frame) => {
                        if let Err(e) = sender.send(Message::Text(frame.into())).await {
                            warn!(error = %e, "Failed to send event");
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                }
            }

            _ = state.shutdown.wait() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!(subscriber = subscription.id(), "Notification WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_event_types_are_split_and_trimmed() {
        let filter = EventFilter::from(SubscriptionQuery {
            spot_id: Some("A1".into()),
            event_types: Some("reservation_created, spot_status_changed,".into()),
            ..SubscriptionQuery::default()
        });
        assert_eq!(filter.spot_id.as_deref(), Some("A1"));
        assert_eq!(
            filter.event_types,
            vec!["reservation_created", "spot_status_changed"]
        );
    }

    #[test]
    fn resync_frame_carries_missed_count() {
        let frame = frame_for(&Delivery::Resync { missed: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "resync");
        assert_eq!(value["missed"], 3);
    }
}
