//! WebSocket push channel.
//!
//! Every frame in either direction is `{"event": ..., "data": ...}`. On
//! connect the session subscribes to the [`Broadcaster`](crate::monitor::Broadcaster)
//! and forwards whatever it publishes; client frames are answered on the
//! same socket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::monitor::broadcast::RequestFailure;
use crate::monitor::{BulkAction, Monitor, PodAction, PushEvent, Subscription};
use crate::server::state::AppState;

/// Raw client frame; `data` is decoded per event
#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeRequest {
    #[serde(default)]
    namespaces: Option<Vec<String>>,
}

pub async fn push_channel(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, state.monitor))
}

async fn session(socket: WebSocket, monitor: Arc<Monitor>) {
    let broadcaster = monitor.broadcaster().clone();
    let Subscription { id, mut events } = broadcaster.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&monitor, id, text.as_str()).await {
                            if send_event(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Subscriber {} socket error: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    broadcaster.unsubscribe(&id);
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &PushEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(e) => {
            warn!("Failed to encode {} event: {}", event.name(), e);
            Ok(())
        }
    }
}

/// Answer one client frame. `None` means there is nothing to send back.
async fn handle_frame(monitor: &Monitor, id: Uuid, text: &str) -> Option<PushEvent> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Subscriber {} sent an unreadable frame: {}", id, e);
            return None;
        }
    };

    match frame.event.as_str() {
        "subscribe-pods" => {
            let request: SubscribeRequest = if frame.data.is_null() {
                SubscribeRequest::default()
            } else {
                serde_json::from_value(frame.data).unwrap_or_default()
            };
            info!(
                "Subscriber {} subscribed to pod updates: {}",
                id,
                request
                    .namespaces
                    .as_ref()
                    .map(|list| list.join(", "))
                    .unwrap_or_else(|| "all".to_string())
            );
            Some(PushEvent::SubscriptionConfirmed {
                namespaces: request.namespaces,
            })
        }
        "get-pods" => Some(PushEvent::PodsData(monitor.snapshot())),
        "execute-action" => Some(execute_action(monitor, frame.data).await),
        "execute-bulk-action" => Some(execute_bulk(monitor, frame.data).await),
        other => {
            warn!("Subscriber {} sent unknown event {}", id, other);
            None
        }
    }
}

async fn execute_action(monitor: &Monitor, data: Value) -> PushEvent {
    let namespace = data
        .get("namespace")
        .and_then(Value::as_str)
        .map(str::to_string);

    let action: PodAction = match serde_json::from_value(data) {
        Ok(action) => action,
        Err(e) => {
            return PushEvent::ActionError(RequestFailure {
                success: false,
                message: format!("Invalid action request: {}", e),
                action: None,
                namespace,
                namespaces: None,
            })
        }
    };

    let kind = action.action;
    match monitor.execute_action(action).await {
        Ok(outcome) => PushEvent::ActionCompleted(outcome),
        Err(e) => {
            warn!("Action execution failed: {}", e);
            PushEvent::ActionError(RequestFailure {
                success: false,
                message: e.to_string(),
                action: Some(kind),
                namespace,
                namespaces: None,
            })
        }
    }
}

async fn execute_bulk(monitor: &Monitor, data: Value) -> PushEvent {
    match serde_json::from_value::<BulkAction>(data.clone()) {
        Ok(bulk) => PushEvent::BulkActionCompleted(monitor.execute_bulk(bulk).await),
        Err(e) => {
            warn!("Bulk action execution failed: {}", e);
            let namespaces = data
                .get("namespaces")
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            PushEvent::BulkActionError(RequestFailure {
                success: false,
                message: format!("Invalid bulk action request: {}", e),
                action: data
                    .get("action")
                    .and_then(|v| serde_json::from_value(v.clone()).ok()),
                namespace: None,
                namespaces,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::{self, MockClusterClient};
    use crate::config::{MonitorConfig, NamespaceConfig};
    use crate::monitor::ActionKind;
    use serde_json::json;

    async fn monitor(mock: Arc<MockClusterClient>) -> Monitor {
        let monitor = Monitor::new(
            mock,
            vec![NamespaceConfig::new("apps")],
            MonitorConfig::default(),
        );
        monitor.initialize().await;
        monitor
    }

    #[tokio::test]
    async fn test_subscribe_pods_is_confirmed() {
        let monitor = monitor(Arc::new(MockClusterClient::new())).await;

        let frame = json!({"event": "subscribe-pods", "data": {"namespaces": ["apps"]}});
        match handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await {
            Some(PushEvent::SubscriptionConfirmed { namespaces }) => {
                assert_eq!(namespaces, Some(vec!["apps".to_string()]));
            }
            other => panic!("expected subscription-confirmed, got {:?}", other),
        }

        let frame = json!({"event": "subscribe-pods"});
        assert!(matches!(
            handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await,
            Some(PushEvent::SubscriptionConfirmed { namespaces: None })
        ));
    }

    #[tokio::test]
    async fn test_get_pods_returns_snapshot() {
        let mock = Arc::new(MockClusterClient::new());
        mock.set_pods("apps", vec![mock::pod("apps", "web-1", "Running", &[0])]);
        let monitor = monitor(mock).await;

        let frame = json!({"event": "get-pods"});
        match handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await {
            Some(PushEvent::PodsData(snapshot)) => {
                assert_eq!(snapshot.pods.len(), 1);
                assert!(snapshot.connected);
            }
            other => panic!("expected pods-data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_action_replies_completed() {
        let mock = Arc::new(MockClusterClient::new());
        mock.set_pods("apps", vec![mock::pod("apps", "web-1", "Running", &[0])]);
        let monitor = monitor(mock.clone()).await;

        let frame = json!({
            "event": "execute-action",
            "data": {"action": "restart", "namespace": "apps", "podName": "web"}
        });
        match handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await {
            Some(PushEvent::ActionCompleted(outcome)) => {
                assert!(outcome.success);
                assert_eq!(outcome.affected_pods, vec!["web-1"]);
            }
            other => panic!("expected action-completed, got {:?}", other),
        }
        assert_eq!(
            mock.deletions(),
            vec![("apps".to_string(), "web-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_action_replies_error() {
        let monitor = monitor(Arc::new(MockClusterClient::new())).await;

        let frame = json!({
            "event": "execute-action",
            "data": {"action": "stop", "namespace": "Bad Name"}
        });
        match handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await {
            Some(PushEvent::ActionError(failure)) => {
                assert!(!failure.success);
                assert_eq!(failure.action, Some(ActionKind::Stop));
                assert_eq!(failure.namespace.as_deref(), Some("Bad Name"));
            }
            other => panic!("expected action-error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_bulk_replies_error() {
        let monitor = monitor(Arc::new(MockClusterClient::new())).await;

        let frame = json!({
            "event": "execute-bulk-action",
            "data": {"action": "explode", "namespaces": ["apps"]}
        });
        match handle_frame(&monitor, Uuid::new_v4(), &frame.to_string()).await {
            Some(PushEvent::BulkActionError(failure)) => {
                assert_eq!(failure.namespaces, Some(vec!["apps".to_string()]));
                assert_eq!(failure.action, None);
            }
            other => panic!("expected bulk-action-error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_and_unreadable_frames_are_ignored() {
        let monitor = monitor(Arc::new(MockClusterClient::new())).await;

        let frame = json!({"event": "self-destruct"});
        assert!(handle_frame(&monitor, Uuid::new_v4(), &frame.to_string())
            .await
            .is_none());
        assert!(handle_frame(&monitor, Uuid::new_v4(), "not json")
            .await
            .is_none());
    }
}
