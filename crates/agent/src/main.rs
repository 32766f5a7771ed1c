//! stowage agent entry point.
//!
//! Boots the caching agent, runs registration (install + activate), then
//! serves host triggers over the stdio line protocol. Logging goes to
//! stderr to keep stdout clean for protocol lines.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

mod agent;
mod error;
mod hooks;
mod host;
mod lifecycle;
mod resolve;
mod router;
mod stdio;
#[cfg(test)]
mod testing;

use agent::Agent;
use host::EmptyLocalStore;
use router::HostEvent;
use stdio::{StdioHost, WireReply, WireTrigger};
use stowage_client::fetch::canonicalize;
use stowage_client::{Disposition, FetchClient, FetchConfig, Method, OutboundRequest};
use stowage_core::AppConfig;
use stowage_core::cache::CacheDb;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(build = %config.build_label, origin = %config.origin, "starting stowage agent");

    let db = CacheDb::open(&config.db_path).await?;
    let fetch_config = FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    };
    let network = Arc::new(FetchClient::new(fetch_config)?);
    let io = Arc::new(StdioHost::new());

    let agent = Agent::new(&config, db, network, io.clone(), io.clone(), Arc::new(EmptyLocalStore))?;

    // Registration: a fresh boot installs and activates before the first
    // interception can arrive.
    agent.dispatch_now(HostEvent::Install).await;
    agent.dispatch_now(HostEvent::Activate).await;
    tracing::info!(phase = ?agent.lifecycle().phase().await, "registration complete");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(trigger) = stdio::parse_line(&line) else {
            continue;
        };

        match trigger {
            WireTrigger::Fetch { url, method, navigate } => dispatch_fetch(&agent, &io, url, method, navigate),
            other => {
                if let Some(event) = stdio::to_event(other) {
                    agent.dispatch(event);
                }
            }
        }
    }

    // Host teardown: stop taking interceptions, then let every live task
    // signal completion.
    agent.lifecycle().retire().await;
    agent.drain().await;
    Ok(())
}

/// Wire one fetch trigger: build the request, dispatch it, and park a
/// task that relays whatever comes back over the responder.
fn dispatch_fetch(agent: &Agent<FetchClient>, io: &Arc<StdioHost>, url: String, method: Option<String>, navigate: bool) {
    let parsed = match canonicalize(&url) {
        Ok(parsed) => parsed,
        Err(err) => {
            io.emit(&WireReply::Failure { url, error: err.to_string() });
            return;
        }
    };

    let method = match method {
        Some(raw) => match Method::from_bytes(raw.as_bytes()) {
            Ok(method) => method,
            Err(err) => {
                io.emit(&WireReply::Failure { url, error: err.to_string() });
                return;
            }
        },
        None => Method::GET,
    };

    let disposition = if navigate { Disposition::Navigation } else { Disposition::Subresource };
    let request = OutboundRequest { method, url: parsed, disposition };
    let display_url = request.url.to_string();

    let (tx, rx) = oneshot::channel();
    agent.dispatch(HostEvent::Fetch { request, responder: tx });

    let io = Arc::clone(io);
    agent.tasks().extend(async move {
        match rx.await {
            Ok(Ok(resolved)) => io.emit(&WireReply::Response {
                url: display_url,
                status: resolved.status,
                source: resolved.source.as_str(),
                body: String::from_utf8_lossy(&resolved.body).into_owned(),
            }),
            Ok(Err(err)) => io.emit(&WireReply::Failure { url: display_url, error: err.to_string() }),
            Err(_) => io.emit(&WireReply::Passthrough { url: display_url }),
        }
    });
}
