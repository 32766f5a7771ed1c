//! Event routing for host lifecycle triggers.
//!
//! The host raises independent triggers (install, activate, fetch, sync,
//! periodicsync, push, notificationclick); the router maps each trigger
//! kind to exactly one handler. Dispatching never assumes mutual
//! exclusion between events - every dispatch is its own asynchronous
//! task, and a handler's returned future represents its own completion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::AgentError;
use crate::resolve::Resolved;
use stowage_client::OutboundRequest;

/// The trigger kinds the host environment can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Install,
    Activate,
    Fetch,
    Sync,
    PeriodicSync,
    Push,
    NotificationClick,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::Install => "install",
            TriggerKind::Activate => "activate",
            TriggerKind::Fetch => "fetch",
            TriggerKind::Sync => "sync",
            TriggerKind::PeriodicSync => "periodicsync",
            TriggerKind::Push => "push",
            TriggerKind::NotificationClick => "notificationclick",
        };
        f.write_str(name)
    }
}

/// One typed message per trigger.
///
/// Fetch carries a oneshot responder: the intercepted caller receives its
/// response through the channel while the handler still owns the future
/// representing its own completion. Dropping the responder without
/// sending means "not intercepted" - the host falls through to its own
/// networking.
pub enum HostEvent {
    Install,
    Activate,
    Fetch {
        request: OutboundRequest,
        responder: oneshot::Sender<Result<Resolved, AgentError>>,
    },
    Sync { tag: String },
    PeriodicSync { tag: String },
    Push { payload: Option<Vec<u8>> },
    NotificationClick { action: String },
}

impl HostEvent {
    pub fn kind(&self) -> TriggerKind {
        match self {
            HostEvent::Install => TriggerKind::Install,
            HostEvent::Activate => TriggerKind::Activate,
            HostEvent::Fetch { .. } => TriggerKind::Fetch,
            HostEvent::Sync { .. } => TriggerKind::Sync,
            HostEvent::PeriodicSync { .. } => TriggerKind::PeriodicSync,
            HostEvent::Push { .. } => TriggerKind::Push,
            HostEvent::NotificationClick { .. } => TriggerKind::NotificationClick,
        }
    }
}

/// A handler for a specific trigger kind.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError>;
}

/// Registry of handlers (trigger kind -> handler).
///
/// Built during initialization (mutable), used during runtime
/// (immutable). This avoids locks on the dispatch path.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<TriggerKind, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register the handler for a trigger kind.
    ///
    /// The agent registers exactly one handler per kind; a second
    /// registration is a construction bug, not a runtime condition.
    pub fn register(&mut self, kind: TriggerKind, handler: Arc<dyn EventHandler>) -> Result<(), AgentError> {
        if self.handlers.contains_key(&kind) {
            return Err(AgentError::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch one event to its handler.
    ///
    /// Unhandled trigger kinds are ignored with a log line. Handler
    /// failures are contained here: logged, never propagated to the host
    /// loop.
    pub async fn dispatch(&self, event: HostEvent) {
        let kind = event.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            tracing::debug!(trigger = %kind, "no handler registered, ignoring trigger");
            return;
        };

        if let Err(err) = handler.handle(event).await {
            tracing::warn!(trigger = %kind, error = %err, "handler failed");
        }
    }
}
