//! Interaction callback: react to the user acting on a notification.

use std::sync::Arc;

use async_trait::async_trait;

use super::push::ACTION_OPEN;
use crate::error::AgentError;
use crate::host::WindowClients;
use crate::router::{EventHandler, HostEvent};

/// Handler for `notificationclick` triggers.
///
/// "open" brings the application root to focus (or opens it); every other
/// action just lets the notification go - it was already closed by the
/// host when the interaction arrived.
pub struct InteractionHandler {
    windows: Arc<dyn WindowClients>,
}

impl InteractionHandler {
    pub fn new(windows: Arc<dyn WindowClients>) -> Self {
        Self { windows }
    }
}

#[async_trait]
impl EventHandler for InteractionHandler {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::NotificationClick { action } = event else {
            return Ok(());
        };

        if action == ACTION_OPEN {
            tracing::info!("notification opened, focusing application root");
            self.windows.focus_or_open("/").await;
        } else {
            tracing::debug!(%action, "notification dismissed");
        }
        Ok(())
    }
}
