//! JSON-line wire protocol for host triggers.
//!
//! The host raises triggers as one JSON object per stdin line; the agent
//! answers fetch interceptions and emits notification/window instructions
//! as JSON lines on stdout. Logging stays on stderr so stdout carries
//! nothing but protocol.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::host::{NotificationRecord, NotificationSink, WindowClients};
use crate::router::HostEvent;

/// An inbound trigger line.
#[derive(Debug, Deserialize)]
#[serde(tag = "trigger", rename_all = "lowercase")]
pub enum WireTrigger {
    Install,
    Activate,
    Fetch {
        url: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        navigate: bool,
    },
    Sync { tag: String },
    PeriodicSync { tag: String },
    Push {
        #[serde(default)]
        payload: Option<String>,
    },
    NotificationClick { action: String },
}

/// An outbound protocol line.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WireReply {
    /// The interception produced a response.
    Response { url: String, status: u16, source: &'static str, body: String },
    /// Not intercepted; the host should use its own networking.
    Passthrough { url: String },
    /// The interception failed and no fallback applied.
    Failure { url: String, error: String },
    /// Display a notification.
    Notification { record: NotificationRecord },
    /// Route all consumers through this instance.
    Claim,
    /// Bring the view at `path` to focus, opening it if needed.
    Focus { path: String },
}

/// Parse one stdin line; undecodable lines are logged and ignored.
pub fn parse_line(line: &str) -> Option<WireTrigger> {
    match serde_json::from_str(line.trim()) {
        Ok(trigger) => Some(trigger),
        Err(err) => {
            tracing::warn!(error = %err, "unparseable trigger line, ignoring");
            None
        }
    }
}

/// Map a non-fetch trigger onto its host event.
///
/// Fetch is wired by the caller because it needs a responder channel.
pub fn to_event(trigger: WireTrigger) -> Option<HostEvent> {
    match trigger {
        WireTrigger::Install => Some(HostEvent::Install),
        WireTrigger::Activate => Some(HostEvent::Activate),
        WireTrigger::Sync { tag } => Some(HostEvent::Sync { tag }),
        WireTrigger::PeriodicSync { tag } => Some(HostEvent::PeriodicSync { tag }),
        WireTrigger::Push { payload } => Some(HostEvent::Push { payload: payload.map(String::into_bytes) }),
        WireTrigger::NotificationClick { action } => Some(HostEvent::NotificationClick { action }),
        WireTrigger::Fetch { .. } => None,
    }
}

/// The stdout side of the protocol, doubling as the notification sink and
/// window controller for a host that speaks the line protocol.
pub struct StdioHost {
    out: Mutex<std::io::Stdout>,
}

impl Default for StdioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl StdioHost {
    pub fn new() -> Self {
        Self { out: Mutex::new(std::io::stdout()) }
    }

    /// Write one protocol line. Serialization failure is contained here;
    /// a host that stops reading is not the agent's problem.
    pub fn emit(&self, reply: &WireReply) {
        if let Ok(line) = serde_json::to_string(reply) {
            self.write_line(&line);
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().expect("stdout lock poisoned");
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

#[async_trait]
impl NotificationSink for StdioHost {
    async fn show(&self, record: NotificationRecord) -> Result<(), AgentError> {
        let line = serde_json::to_string(&WireReply::Notification { record })
            .map_err(|err| AgentError::Notify(err.to_string()))?;
        self.write_line(&line);
        Ok(())
    }
}

#[async_trait]
impl WindowClients for StdioHost {
    async fn claim(&self) {
        self.emit(&WireReply::Claim);
    }

    async fn focus_or_open(&self, path: &str) {
        self.emit(&WireReply::Focus { path: path.to_string() });
    }
}
