use crate::remote::RemoteGateway;
use crate::router::LogicalAction;
use crate::utils::logger::{log_event, LogEvent, OperationPhase};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Result of one dispatched action, delivered to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchNotification {
    pub event_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Fires logical actions at the remote gateway off the command path.
///
/// Each action runs on its own task; completions may arrive in any order and
/// failures are reported, never retried.
#[derive(Clone)]
pub struct EventDispatcher {
    gateway: Arc<dyn RemoteGateway>,
    notifications: broadcast::Sender<DispatchNotification>,
}

impl EventDispatcher {
    pub fn new(gateway: Arc<dyn RemoteGateway>, capacity: usize) -> Self {
        let (notifications, _) = broadcast::channel(capacity.max(1));
        Self {
            gateway,
            notifications,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchNotification> {
        self.notifications.subscribe()
    }

    pub fn dispatch(&self, action: LogicalAction) -> JoinHandle<DispatchNotification> {
        let gateway = self.gateway.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let event_name = action.event_name().to_string();
            let (event_type, data) = action.remote_event();
            let started = Instant::now();

            log::info!("[DISPATCH] Firing {} ({})", event_name, event_type);
            let result = gateway.fire_event(event_type, data).await;

            let notification = match result {
                Ok(()) => {
                    log_event(LogEvent::Operation {
                        name: format!("[DISPATCH] {}", event_name),
                        phase: OperationPhase::Complete {
                            duration_ms: started.elapsed().as_millis() as u64,
                        },
                    });
                    DispatchNotification {
                        event_name,
                        success: true,
                        error_message: None,
                    }
                }
                Err(e) => {
                    log_event(LogEvent::Operation {
                        name: format!("[DISPATCH] {}", event_name),
                        phase: OperationPhase::Failed {
                            error: e.to_string(),
                        },
                    });
                    DispatchNotification {
                        event_name,
                        success: false,
                        error_message: Some(e.to_string()),
                    }
                }
            };

            // No observer listening is fine
            let _ = notifications.send(notification.clone());
            notification
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteGateway, RemoteError};
    use crate::router::ActionKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_notification() {
        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_fire_event()
            .withf(|event_type, data| {
                event_type == "android_device_volume"
                    && data["entity_id"] == "light.lamp"
                    && data["volume"] == 70
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = EventDispatcher::new(Arc::new(gateway), 8);
        let mut observer = dispatcher.subscribe();

        let mut action = LogicalAction::for_device(ActionKind::VolumeSet, "light.lamp");
        action.volume = Some(70);
        let result = dispatcher.dispatch(action).await.unwrap();

        assert_eq!(
            result,
            DispatchNotification {
                event_name: "device_volume".to_string(),
                success: true,
                error_message: None,
            }
        );
        assert_eq!(observer.recv().await.unwrap(), result);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_retried() {
        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_fire_event()
            .times(1)
            .returning(|_, _| Err(RemoteError::Timeout(10_000)));

        let dispatcher = EventDispatcher::new(Arc::new(gateway), 8);
        let mut observer = dispatcher.subscribe();
        dispatcher.dispatch(LogicalAction::generic(ActionKind::Stop));

        let notification = tokio::time::timeout(Duration::from_secs(1), observer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.event_name, "stop");
        assert!(!notification.success);
        assert_eq!(
            notification.error_message.as_deref(),
            Some("Request timed out after 10000ms")
        );
    }

    #[tokio::test]
    async fn test_out_of_order_completions() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_fire_event().times(3).returning(|event_type, _| {
            if event_type == "android_media_next" {
                Err(RemoteError::Network("connection reset".to_string()))
            } else {
                Ok(())
            }
        });

        let dispatcher = EventDispatcher::new(Arc::new(gateway), 8);
        let handles = [ActionKind::Play, ActionKind::Next, ActionKind::Stop]
            .into_iter()
            .map(|kind| dispatcher.dispatch(LogicalAction::generic(kind)));
        let mut results: Vec<_> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();
        results.sort_by(|a, b| a.event_name.cmp(&b.event_name));

        let outcomes: Vec<_> = results
            .iter()
            .map(|n| (n.event_name.as_str(), n.success))
            .collect();
        assert_eq!(outcomes, vec![("next", false), ("play", true), ("stop", true)]);
    }

    #[tokio::test]
    async fn test_dispatch_without_observers() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_fire_event().returning(|_, _| Ok(()));

        let dispatcher = EventDispatcher::new(Arc::new(gateway), 8);
        let result = dispatcher
            .dispatch(LogicalAction::generic(ActionKind::Play))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.event_name, "play");
    }
}
