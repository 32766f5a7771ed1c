//! Scheduled sync: poll the update-check endpoint on the host's interval.
//!
//! Anything short of a well-formed 2xx `{"hasNewContent": true}` is
//! treated as "no update" - an unreachable or misbehaving endpoint must
//! never surface as a fatal error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::NEW_CONTENT_BODY;
use crate::error::AgentError;
use crate::host::{NotificationRecord, NotificationSink};
use crate::router::{EventHandler, HostEvent};
use stowage_client::Network;

#[derive(Debug, Deserialize)]
struct UpdateCheck {
    #[serde(rename = "hasNewContent", default)]
    has_new_content: bool,
}

/// Handler for `periodicsync` triggers.
pub struct ScheduledSyncHandler<N> {
    tag: String,
    network: Arc<N>,
    endpoint: Url,
    sink: Arc<dyn NotificationSink>,
    title: String,
    icon: String,
    badge: String,
}

impl<N: Network> ScheduledSyncHandler<N> {
    pub fn new(
        tag: String, network: Arc<N>, endpoint: Url, sink: Arc<dyn NotificationSink>, title: String, icon: String,
        badge: String,
    ) -> Self {
        Self { tag, network, endpoint, sink, title, icon, badge }
    }

    async fn run(&self) {
        let response = match self.network.get(&self.endpoint).await {
            Ok(response) => response,
            Err(fetch_err) => {
                let err = AgentError::UpdateCheck(fetch_err.to_string());
                tracing::warn!(error = %err, "update check unreachable");
                return;
            }
        };

        if !response.status.is_success() {
            tracing::debug!(status = response.status.as_u16(), "update check non-success, treating as no update");
            return;
        }

        let update: UpdateCheck = match serde_json::from_slice(&response.bytes) {
            Ok(update) => update,
            Err(decode_err) => {
                let err = AgentError::UpdateCheck(format!("malformed body: {}", decode_err));
                tracing::warn!(error = %err, "update check undecodable, treating as no update");
                return;
            }
        };

        if !update.has_new_content {
            tracing::debug!("no new content");
            return;
        }

        let record = NotificationRecord::basic(&self.title, NEW_CONTENT_BODY, &self.icon, &self.badge);
        if let Err(err) = self.sink.show(record).await {
            tracing::warn!(error = %err, "new-content notification failed");
        }
    }
}

#[async_trait]
impl<N: Network + 'static> EventHandler for ScheduledSyncHandler<N> {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::PeriodicSync { tag } = event else {
            return Ok(());
        };

        if tag != self.tag {
            tracing::debug!(%tag, expected = %self.tag, "unrecognized periodicsync tag, ignoring");
            return Ok(());
        }

        tracing::info!(%tag, "scheduled sync triggered");
        self.run().await;
        Ok(())
    }
}
