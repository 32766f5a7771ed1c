//! Inbound push: turn an opaque payload into a user notification.

use std::sync::Arc;

use async_trait::async_trait;

use super::NEW_CONTENT_BODY;
use crate::error::AgentError;
use crate::host::{NotificationAction, NotificationRecord, NotificationSink};
use crate::router::{EventHandler, HostEvent};

/// Action id for bringing the application into focus. The default action.
pub const ACTION_OPEN: &str = "open";
/// Action id for dismissing the notification.
pub const ACTION_DISMISS: &str = "dismiss";

/// Handler for `push` triggers.
pub struct PushHandler {
    sink: Arc<dyn NotificationSink>,
    title: String,
    icon: String,
    badge: String,
    vibration: Vec<u32>,
}

impl PushHandler {
    pub fn new(sink: Arc<dyn NotificationSink>, title: String, icon: String, badge: String, vibration: Vec<u32>) -> Self {
        Self { sink, title, icon, badge, vibration }
    }

    fn record_for(&self, payload: Option<Vec<u8>>) -> NotificationRecord {
        let body = payload
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_else(|| NEW_CONTENT_BODY.to_string());

        NotificationRecord {
            title: self.title.clone(),
            body,
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibration: self.vibration.clone(),
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: "Open App".to_string(),
                    icon: self.icon.clone(),
                },
                NotificationAction {
                    action: ACTION_DISMISS.to_string(),
                    title: "Dismiss".to_string(),
                    icon: self.icon.clone(),
                },
            ],
        }
    }
}

#[async_trait]
impl EventHandler for PushHandler {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::Push { payload } = event else {
            return Ok(());
        };

        tracing::info!(has_payload = payload.is_some(), "push received");

        let record = self.record_for(payload);
        if let Err(err) = self.sink.show(record).await {
            tracing::warn!(error = %err, "push notification failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CollectingSink;

    fn handler(sink: &Arc<CollectingSink>) -> PushHandler {
        PushHandler::new(
            sink.clone(),
            "Stowage".to_string(),
            "/assets/icon-192.png".to_string(),
            "/assets/icon-192.png".to_string(),
            vec![100, 50, 100],
        )
    }

    #[tokio::test]
    async fn test_payload_becomes_notification_body() {
        // Scenario E, first half: payload "Hello" with actions {open, dismiss}.
        let sink = Arc::new(CollectingSink::new());
        let h = handler(&sink);

        h.handle(HostEvent::Push { payload: Some(b"Hello".to_vec()) }).await.unwrap();

        let shown = sink.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "Hello");
        let actions: Vec<&str> = shown[0].actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec![ACTION_OPEN, ACTION_DISMISS]);
    }

    #[tokio::test]
    async fn test_absent_payload_uses_default_body() {
        let sink = Arc::new(CollectingSink::new());
        let h = handler(&sink);

        h.handle(HostEvent::Push { payload: None }).await.unwrap();

        assert_eq!(sink.shown()[0].body, NEW_CONTENT_BODY);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let sink = Arc::new(CollectingSink::new());
        let h = handler(&sink);

        h.handle(HostEvent::Push { payload: Some(vec![0x48, 0xff, 0x49]) }).await.unwrap();

        let body = &sink.shown()[0].body;
        assert!(body.starts_with('H'));
        assert!(body.ends_with('I'));
    }

    #[tokio::test]
    async fn test_vibration_pattern_is_attached() {
        let sink = Arc::new(CollectingSink::new());
        let h = handler(&sink);

        h.handle(HostEvent::Push { payload: Some(b"x".to_vec()) }).await.unwrap();

        assert_eq!(sink.shown()[0].vibration, vec![100, 50, 100]);
    }
}
