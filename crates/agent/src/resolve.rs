//! Cache-first request resolution.
//!
//! Cache-first favors instant, offline-capable responses for shell and
//! static assets: a stored artifact is served as-is until a new
//! generation supersedes it, with no freshness check. Misses go to the
//! network, successful responses are written back asynchronously, and a
//! failed navigation falls back to the seeded shell so the application
//! always has something renderable.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::AgentError;
use crate::host::TaskSet;
use crate::lifecycle::Lifecycle;
use crate::router::{EventHandler, HostEvent};
use stowage_client::{Eligibility, Network, OutboundRequest, classify};
use stowage_core::cache::{CacheDb, ResponseArtifact, request_identity};

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Served from the current generation without touching the network.
    Cache,
    /// Fetched from the network (cached or not, per admission).
    Network,
    /// Network unreachable; the seeded shell root stood in.
    ShellFallback,
}

impl ResolvedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedSource::Cache => "cache",
            ResolvedSource::Network => "network",
            ResolvedSource::ShellFallback => "shell-fallback",
        }
    }
}

/// A response handed back to the intercepted caller.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResolvedSource,
}

impl Resolved {
    fn from_artifact(artifact: ResponseArtifact, source: ResolvedSource) -> Self {
        Self { status: artifact.status, headers: artifact.headers, body: artifact.body, source }
    }
}

/// The resolution strategy over the cache store and the network seam.
pub struct Resolver<N> {
    db: CacheDb,
    network: Arc<N>,
    tasks: TaskSet,
    shell_identity: String,
}

impl<N: Network> Resolver<N> {
    /// `origin` anchors the shell-root identity used for navigation fallback.
    pub fn new(db: CacheDb, network: Arc<N>, tasks: TaskSet, origin: &Url) -> Result<Self, AgentError> {
        let shell_url = origin
            .join("/")
            .map_err(|e| AgentError::Config(format!("origin has no root document: {}", e)))?;
        let shell_identity = request_identity("GET", shell_url.as_str());
        Ok(Self { db, network, tasks, shell_identity })
    }

    /// Resolve one eligible request.
    ///
    /// The cache lookup always happens-before any network attempt; distinct
    /// requests carry no ordering guarantee among themselves.
    pub async fn resolve(&self, request: &OutboundRequest) -> Result<Resolved, AgentError> {
        let identity = request.identity();
        let generation = self.current_generation_or_none().await;

        if let Some(generation) = &generation
            && let Some(artifact) = self.lookup_or_none(generation, &identity).await
        {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(Resolved::from_artifact(artifact, ResolvedSource::Cache));
        }

        match self.network.get(&request.url).await {
            Ok(response) => {
                let resolved = Resolved {
                    status: response.status.as_u16(),
                    headers: response.header_pairs(),
                    body: response.bytes.to_vec(),
                    source: ResolvedSource::Network,
                };

                if response.status.is_success() {
                    self.store_response(generation, request, &resolved);
                } else {
                    tracing::debug!(url = %request.url, status = resolved.status, "non-success response, not cached");
                }

                Ok(resolved)
            }
            Err(err) => {
                if request.is_navigation()
                    && let Some(generation) = &generation
                    && let Some(shell) = self.lookup_or_none(generation, &self.shell_identity).await
                {
                    tracing::warn!(url = %request.url, error = %err, "navigation failed, serving shell fallback");
                    return Ok(Resolved::from_artifact(shell, ResolvedSource::ShellFallback));
                }

                Err(AgentError::Network(err.to_string()))
            }
        }
    }

    /// Kick off the best-effort write-back.
    ///
    /// The write is parked in the keep-alive set: it finishes even if the
    /// caller abandons the response, and its failure never fails the
    /// response already handed back.
    fn store_response(&self, generation: Option<String>, request: &OutboundRequest, resolved: &Resolved) {
        let Some(generation) = generation else {
            tracing::debug!(url = %request.url, "no current generation, skipping cache write");
            return;
        };

        let artifact = ResponseArtifact::new(
            request.method.as_str(),
            request.url.as_str(),
            resolved.status,
            resolved.headers.clone(),
            resolved.body.clone(),
        );
        let db = self.db.clone();

        self.tasks.extend(async move {
            if let Err(err) = db.put_artifact(&generation, &artifact).await {
                let err = AgentError::CacheWrite(err.to_string());
                tracing::warn!(url = %artifact.url, error = %err, "cache write failed");
            }
        });
    }

    async fn current_generation_or_none(&self) -> Option<String> {
        match self.db.current_generation().await {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!(error = %err, "could not read current generation, treating as miss");
                None
            }
        }
    }

    async fn lookup_or_none(&self, generation: &str, identity: &str) -> Option<ResponseArtifact> {
        match self.db.lookup_artifact(generation, identity).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "cache lookup failed, treating as miss");
                None
            }
        }
    }
}

/// Handler for fetch-intercept triggers.
///
/// Skipped requests and requests reaching a redundant instance drop the
/// responder without sending - to the host that reads as "not
/// intercepted" and it falls through to its own networking.
pub struct FetchHandler<N> {
    lifecycle: Arc<Lifecycle<N>>,
    resolver: Arc<Resolver<N>>,
    origin: Url,
}

impl<N: Network> FetchHandler<N> {
    pub fn new(lifecycle: Arc<Lifecycle<N>>, resolver: Arc<Resolver<N>>, origin: Url) -> Self {
        Self { lifecycle, resolver, origin }
    }
}

#[async_trait]
impl<N: Network + 'static> EventHandler for FetchHandler<N> {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::Fetch { request, mut responder } = event else {
            return Ok(());
        };

        if self.lifecycle.is_redundant().await {
            tracing::debug!(url = %request.url, "redundant instance, not intercepting");
            return Ok(());
        }

        match classify(&request, &self.origin) {
            Eligibility::Skip(reason) => {
                tracing::debug!(url = %request.url, ?reason, "request not eligible, passing through");
                Ok(())
            }
            Eligibility::Eligible => {
                // Abandon the network wait if the caller goes away; an
                // already-spawned cache write finishes regardless.
                let result = tokio::select! {
                    _ = responder.closed() => {
                        tracing::debug!(url = %request.url, "caller abandoned interception");
                        return Ok(());
                    }
                    result = self.resolver.resolve(&request) => result,
                };
                let _ = responder.send(result);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNetwork;
    use tokio::sync::oneshot;

    const ORIGIN: &str = "https://app.example.com";

    async fn activated_db(label: &str) -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation(label).await.unwrap();
        db.set_current_generation(label).await.unwrap();
        db
    }

    fn resolver(db: &CacheDb, network: &Arc<FakeNetwork>, tasks: &TaskSet) -> Resolver<FakeNetwork> {
        let origin = Url::parse(ORIGIN).unwrap();
        Resolver::new(db.clone(), Arc::clone(network), tasks.clone(), &origin).unwrap()
    }

    fn request(path: &str) -> OutboundRequest {
        OutboundRequest::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_cache_hit_never_touches_network() {
        let db = activated_db("v1").await;
        let req = request("/app.js");
        let artifact = ResponseArtifact::new("GET", req.url.as_str(), 200, Vec::new(), b"cached".to_vec());
        db.put_artifact("v1", &artifact).await.unwrap();

        let network = Arc::new(FakeNetwork::new());
        let resolver = resolver(&db, &network, &TaskSet::new());

        let resolved = resolver.resolve(&req).await.unwrap();
        assert_eq!(resolved.source, ResolvedSource::Cache);
        assert_eq!(resolved.body, b"cached");
        assert_eq!(network.get_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_writes_back() {
        // Scenario C: "/b" not in store, network returns 200 "X".
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/b"), 200, b"X");
        let tasks = TaskSet::new();
        let resolver = resolver(&db, &network, &tasks);

        let req = request("/b");
        let resolved = resolver.resolve(&req).await.unwrap();
        assert_eq!(resolved.source, ResolvedSource::Network);
        assert_eq!(resolved.body, b"X");

        tasks.drain().await;
        let stored = db.lookup_artifact("v1", &req.identity()).await.unwrap().unwrap();
        assert_eq!(stored.body, b"X");
    }

    #[tokio::test]
    async fn test_non_success_returned_but_never_cached() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/missing"), 404, b"not found");
        let tasks = TaskSet::new();
        let resolver = resolver(&db, &network, &tasks);

        let req = request("/missing");
        let resolved = resolver.resolve(&req).await.unwrap();
        assert_eq!(resolved.status, 404);
        assert_eq!(resolved.body, b"not found");

        tasks.drain().await;
        assert!(db.lookup_artifact("v1", &req.identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_navigation_failure_serves_shell() {
        // Scenario D: network unreachable, "/" cached with body "SHELL".
        let db = activated_db("v1").await;
        let shell_url = format!("{ORIGIN}/");
        let shell = ResponseArtifact::new("GET", &shell_url, 200, Vec::new(), b"SHELL".to_vec());
        db.put_artifact("v1", &shell).await.unwrap();

        let network = Arc::new(FakeNetwork::new());
        network.go_offline();
        let resolver = resolver(&db, &network, &TaskSet::new());

        let req = OutboundRequest::navigation(Url::parse(&format!("{ORIGIN}/reader")).unwrap());
        let resolved = resolver.resolve(&req).await.unwrap();
        assert_eq!(resolved.source, ResolvedSource::ShellFallback);
        assert_eq!(resolved.body, b"SHELL");
    }

    #[tokio::test]
    async fn test_subresource_failure_propagates() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.go_offline();
        let resolver = resolver(&db, &network, &TaskSet::new());

        let result = resolver.resolve(&request("/data.json")).await;
        assert!(matches!(result, Err(AgentError::Network(_))));
    }

    #[tokio::test]
    async fn test_navigation_failure_without_shell_propagates() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.go_offline();
        let resolver = resolver(&db, &network, &TaskSet::new());

        let req = OutboundRequest::navigation(Url::parse(&format!("{ORIGIN}/reader")).unwrap());
        let result = resolver.resolve(&req).await;
        assert!(matches!(result, Err(AgentError::Network(_))));
    }

    #[tokio::test]
    async fn test_no_current_generation_still_serves_network() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/a"), 200, b"A");
        let tasks = TaskSet::new();
        let resolver = resolver(&db, &network, &tasks);

        let resolved = resolver.resolve(&request("/a")).await.unwrap();
        assert_eq!(resolved.body, b"A");
        tasks.drain().await;
    }

    #[tokio::test]
    async fn test_fetch_handler_drops_responder_for_cross_origin() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        let tasks = TaskSet::new();
        let origin = Url::parse(ORIGIN).unwrap();
        let lifecycle = Arc::new(crate::testing::active_lifecycle(&db, &network).await);
        let resolver = Arc::new(resolver(&db, &network, &tasks));
        let handler = FetchHandler::new(lifecycle, resolver, origin);

        let (tx, rx) = oneshot::channel();
        let req = OutboundRequest::get(Url::parse("https://cdn.example.net/lib.js").unwrap());
        handler
            .handle(HostEvent::Fetch { request: req, responder: tx })
            .await
            .unwrap();

        // Responder dropped without a send: not intercepted.
        assert!(rx.await.is_err());
        assert_eq!(network.get_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_handler_refuses_when_redundant() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/a"), 200, b"A");
        let tasks = TaskSet::new();
        let origin = Url::parse(ORIGIN).unwrap();
        let lifecycle = Arc::new(crate::testing::active_lifecycle(&db, &network).await);
        lifecycle.retire().await;
        let resolver = Arc::new(resolver(&db, &network, &tasks));
        let handler = FetchHandler::new(lifecycle, resolver, origin);

        let (tx, rx) = oneshot::channel();
        handler
            .handle(HostEvent::Fetch { request: request("/a"), responder: tx })
            .await
            .unwrap();

        assert!(rx.await.is_err());
        assert_eq!(network.get_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_handler_answers_eligible_request() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/a"), 200, b"A");
        let tasks = TaskSet::new();
        let origin = Url::parse(ORIGIN).unwrap();
        let lifecycle = Arc::new(crate::testing::active_lifecycle(&db, &network).await);
        let resolver = Arc::new(resolver(&db, &network, &tasks));
        let handler = FetchHandler::new(lifecycle, resolver, origin);

        let (tx, rx) = oneshot::channel();
        handler
            .handle(HostEvent::Fetch { request: request("/a"), responder: tx })
            .await
            .unwrap();

        let resolved = rx.await.unwrap().unwrap();
        assert_eq!(resolved.body, b"A");
        tasks.drain().await;
    }

    #[tokio::test]
    async fn test_abandoned_interception_still_completes_write() {
        let db = activated_db("v1").await;
        let network = Arc::new(FakeNetwork::new());
        network.route(&format!("{ORIGIN}/slow"), 200, b"S");
        let tasks = TaskSet::new();
        let resolver = resolver(&db, &network, &tasks);

        let req = request("/slow");
        // Resolve directly and drop the result - the write-back must still land.
        let _ = resolver.resolve(&req).await.unwrap();
        tasks.drain().await;
        assert!(db.contains_artifact("v1", &req.identity()).await.unwrap());
    }
}
