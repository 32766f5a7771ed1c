//! Agent assembly.
//!
//! Wires the router, lifecycle, resolver, and background hooks together
//! from configuration plus the host collaborators, and owns the
//! keep-alive task set the host drains before teardown.

use std::sync::Arc;

use url::Url;

use crate::error::AgentError;
use crate::hooks::{DeferredSyncHandler, InteractionHandler, PushHandler, ScheduledSyncHandler};
use crate::host::{LocalStore, NotificationSink, TaskSet, WindowClients};
use crate::lifecycle::{ActivateHandler, InstallHandler, Lifecycle};
use crate::resolve::{FetchHandler, Resolver};
use crate::router::{EventRouter, HostEvent, TriggerKind};
use stowage_client::Network;
use stowage_core::AppConfig;
use stowage_core::cache::CacheDb;

/// One agent instance: a router over one lifecycle and one cache store.
pub struct Agent<N> {
    router: Arc<EventRouter>,
    tasks: TaskSet,
    lifecycle: Arc<Lifecycle<N>>,
}

impl<N: Network + 'static> Agent<N> {
    /// Build the agent and register exactly one handler per trigger kind.
    pub fn new(
        config: &AppConfig, db: CacheDb, network: Arc<N>, sink: Arc<dyn NotificationSink>,
        windows: Arc<dyn WindowClients>, store: Arc<dyn LocalStore>,
    ) -> Result<Self, AgentError> {
        let origin = Url::parse(&config.origin).map_err(|e| AgentError::Config(format!("invalid origin: {}", e)))?;
        let update_endpoint = origin
            .join(&config.update_endpoint)
            .map_err(|e| AgentError::Config(format!("invalid update_endpoint: {}", e)))?;
        let sync_endpoint = origin
            .join(&config.sync_endpoint)
            .map_err(|e| AgentError::Config(format!("invalid sync_endpoint: {}", e)))?;

        let tasks = TaskSet::new();
        let lifecycle = Arc::new(Lifecycle::new(
            db.clone(),
            Arc::clone(&network),
            Arc::clone(&windows),
            config.build_label.clone(),
            origin.clone(),
            config.shell_manifest.clone(),
        ));
        let resolver = Arc::new(Resolver::new(db, Arc::clone(&network), tasks.clone(), &origin)?);

        let mut router = EventRouter::new();
        router.register(TriggerKind::Install, Arc::new(InstallHandler::new(Arc::clone(&lifecycle))))?;
        router.register(TriggerKind::Activate, Arc::new(ActivateHandler::new(Arc::clone(&lifecycle))))?;
        router.register(
            TriggerKind::Fetch,
            Arc::new(FetchHandler::new(Arc::clone(&lifecycle), resolver, origin)),
        )?;
        router.register(
            TriggerKind::Sync,
            Arc::new(DeferredSyncHandler::new(
                config.deferred_sync_tag.clone(),
                store,
                Arc::clone(&network),
                sync_endpoint,
            )),
        )?;
        router.register(
            TriggerKind::PeriodicSync,
            Arc::new(ScheduledSyncHandler::new(
                config.scheduled_sync_tag.clone(),
                Arc::clone(&network),
                update_endpoint,
                Arc::clone(&sink),
                config.app_title.clone(),
                config.notification_icon.clone(),
                config.notification_badge.clone(),
            )),
        )?;
        router.register(
            TriggerKind::Push,
            Arc::new(PushHandler::new(
                sink,
                config.app_title.clone(),
                config.notification_icon.clone(),
                config.notification_badge.clone(),
                config.vibration.clone(),
            )),
        )?;
        router.register(TriggerKind::NotificationClick, Arc::new(InteractionHandler::new(windows)))?;

        tracing::debug!(build = %lifecycle.build_label(), handlers = router.len(), "agent assembled");

        Ok(Self { router: Arc::new(router), tasks, lifecycle })
    }

    /// Dispatch an event as an independent keep-alive task.
    ///
    /// Events do not serialize against each other; the host may raise
    /// any number of them concurrently.
    pub fn dispatch(&self, event: HostEvent) {
        let router = Arc::clone(&self.router);
        self.tasks.extend(async move { router.dispatch(event).await });
    }

    /// Dispatch an event and wait for its handler to finish.
    ///
    /// Registration uses this so install and activate complete before the
    /// first interception arrives.
    pub async fn dispatch_now(&self, event: HostEvent) {
        self.router.dispatch(event).await;
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle<N>> {
        &self.lifecycle
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Await every outstanding task. The host calls this before teardown.
    pub async fn drain(&self) {
        self.tasks.drain().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecyclePhase;
    use crate::testing::{CollectingSink, FakeNetwork, RecordingWindows, StaticLocalStore};
    use stowage_client::OutboundRequest;
    use tokio::sync::oneshot;

    const ORIGIN: &str = "https://app.example.com";

    fn config() -> AppConfig {
        AppConfig {
            build_label: "v2".into(),
            origin: ORIGIN.into(),
            shell_manifest: vec!["/".into(), "/index.html".into()],
            ..Default::default()
        }
    }

    async fn agent_with(network: Arc<FakeNetwork>) -> (Agent<FakeNetwork>, CacheDb, Arc<CollectingSink>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let sink = Arc::new(CollectingSink::new());
        let agent = Agent::new(
            &config(),
            db.clone(),
            network,
            sink.clone(),
            Arc::new(RecordingWindows::new()),
            Arc::new(StaticLocalStore::default()),
        )
        .unwrap();
        (agent, db, sink)
    }

    #[tokio::test]
    async fn test_exactly_one_handler_per_trigger_kind() {
        let network = Arc::new(FakeNetwork::new());
        let (agent, _, _) = agent_with(network).await;
        assert_eq!(agent.router.len(), 7);
    }

    #[tokio::test]
    async fn test_registration_installs_and_activates() {
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/"), 200, b"root");
        network.route(&format!("{ORIGIN}/index.html"), 200, b"index");
        let (agent, db, _) = agent_with(network).await;

        agent.dispatch_now(HostEvent::Install).await;
        agent.dispatch_now(HostEvent::Activate).await;

        assert_eq!(agent.lifecycle().phase().await, LifecyclePhase::Active);
        assert_eq!(db.current_generation().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(db.count_artifacts("v2").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_seed_failure_never_blocks_activation() {
        let network = Arc::new(FakeNetwork::new());
        network.go_offline();
        let (agent, db, _) = agent_with(network).await;

        agent.dispatch_now(HostEvent::Install).await;
        agent.dispatch_now(HostEvent::Activate).await;

        assert_eq!(agent.lifecycle().phase().await, LifecyclePhase::Active);
        assert_eq!(db.list_generations().await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_roundtrip_through_dispatch() {
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/"), 200, b"root");
        network.route(&format!("{ORIGIN}/index.html"), 200, b"index");
        network.route(&format!("{ORIGIN}/data.json"), 200, b"{}");
        let (agent, _, _) = agent_with(network).await;

        agent.dispatch_now(HostEvent::Install).await;
        agent.dispatch_now(HostEvent::Activate).await;

        let (tx, rx) = oneshot::channel();
        let request = OutboundRequest::get(Url::parse(&format!("{ORIGIN}/data.json")).unwrap());
        agent.dispatch(HostEvent::Fetch { request, responder: tx });

        let resolved = rx.await.unwrap().unwrap();
        assert_eq!(resolved.body, b"{}");
        agent.drain().await;
    }

    #[tokio::test]
    async fn test_push_through_dispatch_reaches_sink() {
        let network = Arc::new(FakeNetwork::new());
        let (agent, _, sink) = agent_with(network).await;

        agent.dispatch(HostEvent::Push { payload: Some(b"Hello".to_vec()) });
        agent.drain().await;

        assert_eq!(sink.shown().len(), 1);
        assert_eq!(sink.shown()[0].body, "Hello");
    }
}
