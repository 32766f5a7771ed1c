//! Deferred sync: upload pending local records once connectivity returns.
//!
//! The host raises the trigger when the network comes back; retry cadence
//! is the host's job, so a failed transmit is logged and simply waits for
//! the next trigger.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::AgentError;
use crate::host::LocalStore;
use crate::router::{EventHandler, HostEvent};
use stowage_client::Network;

/// Handler for `sync` triggers.
pub struct DeferredSyncHandler<N> {
    tag: String,
    store: Arc<dyn LocalStore>,
    network: Arc<N>,
    endpoint: Url,
}

impl<N: Network> DeferredSyncHandler<N> {
    pub fn new(tag: String, store: Arc<dyn LocalStore>, network: Arc<N>, endpoint: Url) -> Self {
        Self { tag, store, network, endpoint }
    }

    async fn run(&self) {
        let notes = self.store.pending_notes().await;
        let bookmarks = self.store.pending_bookmarks().await;

        if notes.is_empty() && bookmarks.is_empty() {
            tracing::debug!("nothing pending, deferred sync done");
            return;
        }

        let note_count = notes.len();
        let bookmark_count = bookmarks.len();
        let body = serde_json::json!({
            "notes": notes,
            "bookmarks": bookmarks,
        });

        match self.network.post_json(&self.endpoint, &body).await {
            Ok(response) if response.status.is_success() => {
                tracing::info!(notes = note_count, bookmarks = bookmark_count, "synced pending records");
            }
            Ok(response) => {
                let err = AgentError::SyncTransmit(format!("status {}", response.status.as_u16()));
                tracing::warn!(error = %err, "deferred sync rejected, host will re-trigger");
            }
            Err(fetch_err) => {
                let err = AgentError::SyncTransmit(fetch_err.to_string());
                tracing::warn!(error = %err, "deferred sync unreachable, host will re-trigger");
            }
        }
    }
}

#[async_trait]
impl<N: Network + 'static> EventHandler for DeferredSyncHandler<N> {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::Sync { tag } = event else {
            return Ok(());
        };

        if tag != self.tag {
            tracing::debug!(%tag, expected = %self.tag, "unrecognized sync tag, ignoring");
            return Ok(());
        }

        tracing::info!(%tag, "deferred sync triggered");
        self.run().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Bookmark, Note};
    use crate::testing::{FakeNetwork, StaticLocalStore};

    const ENDPOINT: &str = "https://app.example.com/api/sync";

    fn note(id: &str) -> Note {
        Note { id: id.to_string(), body: "text".to_string(), updated_at: "2026-01-01T00:00:00Z".to_string() }
    }

    fn bookmark(id: &str) -> Bookmark {
        Bookmark { id: id.to_string(), target: "/reader/3".to_string(), created_at: "2026-01-01T00:00:00Z".to_string() }
    }

    fn handler(store: StaticLocalStore, network: &Arc<FakeNetwork>) -> DeferredSyncHandler<FakeNetwork> {
        DeferredSyncHandler::new(
            "deferred-sync".to_string(),
            Arc::new(store),
            Arc::clone(network),
            Url::parse(ENDPOINT).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_nothing_pending_skips_transmit() {
        let network = Arc::new(FakeNetwork::new());
        let h = handler(StaticLocalStore::default(), &network);

        h.handle(HostEvent::Sync { tag: "deferred-sync".into() }).await.unwrap();

        assert_eq!(network.post_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_records_are_transmitted() {
        let network = Arc::new(FakeNetwork::new());
        let store = StaticLocalStore::new(vec![note("n1"), note("n2")], vec![bookmark("b1")]);
        let h = handler(store, &network);

        h.handle(HostEvent::Sync { tag: "deferred-sync".into() }).await.unwrap();

        assert_eq!(network.post_count(), 1);
        let posted = network.posted_bodies();
        assert_eq!(posted[0]["notes"].as_array().unwrap().len(), 2);
        assert_eq!(posted[0]["bookmarks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transmit_failure_is_contained() {
        let network = Arc::new(FakeNetwork::new());
        network.go_offline();
        let store = StaticLocalStore::new(vec![note("n1")], Vec::new());
        let h = handler(store, &network);

        // Must not error out of the handler; the host re-triggers later.
        h.handle(HostEvent::Sync { tag: "deferred-sync".into() }).await.unwrap();
        assert_eq!(network.post_count(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_tag_is_ignored() {
        let network = Arc::new(FakeNetwork::new());
        let store = StaticLocalStore::new(vec![note("n1")], Vec::new());
        let h = handler(store, &network);

        h.handle(HostEvent::Sync { tag: "someone-elses-tag".into() }).await.unwrap();

        assert_eq!(network.post_count(), 0);
    }
}
