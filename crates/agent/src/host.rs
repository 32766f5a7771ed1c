//! Host environment adapters.
//!
//! The agent never owns its own windows, notifications, or user data; it
//! asks the host environment through these traits. Keep-alive is explicit:
//! work that must outlive its triggering event (the "stay alive until this
//! finishes" contract) goes into a [`TaskSet`] the host drains before it
//! is allowed to tear the agent down.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::error::AgentError;

/// A named action attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// A notification as handed to the host for display.
///
/// Fire-and-forget: the agent keeps no history of what it has shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    #[serde(default)]
    pub vibration: Vec<u32>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

impl NotificationRecord {
    /// A plain notification with no actions and no vibration.
    pub fn basic(title: &str, body: &str, icon: &str, badge: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            icon: icon.to_string(),
            badge: badge.to_string(),
            vibration: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// A pending note awaiting upload, as exposed by the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub body: String,
    pub updated_at: String,
}

/// A pending bookmark awaiting upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub target: String,
    pub created_at: String,
}

/// Delivers notifications to the user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, record: NotificationRecord) -> Result<(), AgentError>;
}

/// Controls the application's windows/consumers.
#[async_trait]
pub trait WindowClients: Send + Sync {
    /// Route all existing consumers through this agent instance immediately.
    async fn claim(&self);

    /// Bring the view at `path` to focus, opening it if it is not open.
    async fn focus_or_open(&self, path: &str);
}

/// Read-only view of locally persisted user data awaiting sync.
///
/// The agent never writes user content; persistence belongs to the
/// application.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn pending_notes(&self) -> Vec<Note>;
    async fn pending_bookmarks(&self) -> Vec<Bookmark>;
}

/// A storage collaborator with nothing pending.
pub struct EmptyLocalStore;

#[async_trait]
impl LocalStore for EmptyLocalStore {
    async fn pending_notes(&self) -> Vec<Note> {
        Vec::new()
    }

    async fn pending_bookmarks(&self) -> Vec<Bookmark> {
        Vec::new()
    }
}

/// Explicit keep-alive registry.
///
/// Handlers park spawned work here (post-response cache writes, dispatched
/// event tasks); the host adapter awaits [`TaskSet::drain`] before
/// permitting teardown. Work in the set is never cancelled just because
/// the response that spawned it is no longer wanted.
#[derive(Clone, Default)]
pub struct TaskSet {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` and keep the agent alive until it completes.
    pub fn extend<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.handles
            .lock()
            .expect("task set lock poisoned")
            .push(handle);
    }

    /// Await every outstanding task, including ones spawned while draining.
    pub async fn drain(&self) {
        loop {
            let batch: Vec<JoinHandle<()>> = {
                let mut handles = self.handles.lock().expect("task set lock poisoned");
                std::mem::take(&mut *handles)
            };
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                let _ = handle.await;
            }
        }
    }
}
