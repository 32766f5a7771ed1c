//! Install/activate lifecycle for cache generations.
//!
//! A new build begins Installing: it opens a generation labeled with the
//! build's label and seeds the app shell into it. The wait phase is
//! skipped on purpose - the newest generation takes over immediately,
//! trading the small risk of a consumer seeing mixed old/new assets for
//! faster rollout. Activation claims the current pointer, evicts every
//! stale generation, and routes all existing consumers through the new
//! instance.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

use crate::error::AgentError;
use crate::host::WindowClients;
use crate::router::{EventHandler, HostEvent};
use stowage_client::Network;
use stowage_core::cache::{CacheDb, ResponseArtifact, request_identity};

/// Phases of one agent instance.
///
/// Active is terminal until a new build supersedes this instance, which
/// then goes Redundant: no new interceptions, in-flight work finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

/// Outcome of seeding the app shell, best-effort by design.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub seeded: usize,
    pub already_present: usize,
    pub failures: Vec<(String, String)>,
}

impl SeedReport {
    pub fn attempted(&self) -> usize {
        self.seeded + self.already_present + self.failures.len()
    }

    pub fn is_total_failure(&self) -> bool {
        !self.failures.is_empty() && self.seeded == 0 && self.already_present == 0
    }
}

/// The lifecycle manager. Sole writer of the current-generation pointer.
pub struct Lifecycle<N> {
    db: CacheDb,
    network: Arc<N>,
    windows: Arc<dyn WindowClients>,
    build_label: String,
    origin: Url,
    shell_manifest: Vec<String>,
    phase: RwLock<LifecyclePhase>,
}

impl<N: Network> Lifecycle<N> {
    pub fn new(
        db: CacheDb, network: Arc<N>, windows: Arc<dyn WindowClients>, build_label: String, origin: Url,
        shell_manifest: Vec<String>,
    ) -> Self {
        Self { db, network, windows, build_label, origin, shell_manifest, phase: RwLock::new(LifecyclePhase::Installing) }
    }

    pub fn build_label(&self) -> &str {
        &self.build_label
    }

    pub async fn phase(&self) -> LifecyclePhase {
        *self.phase.read().await
    }

    pub async fn is_redundant(&self) -> bool {
        self.phase().await == LifecyclePhase::Redundant
    }

    async fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.write().await = phase;
        tracing::debug!(phase = ?phase, build = %self.build_label, "lifecycle phase");
    }

    /// Run the install phase: open and seed this build's generation.
    ///
    /// Seeding is best-effort; failures are reported, logged, and never
    /// block the transition. Ends in Activating because the wait is
    /// skipped unconditionally.
    pub async fn install(&self) -> Result<SeedReport, AgentError> {
        self.set_phase(LifecyclePhase::Installing).await;
        tracing::info!(build = %self.build_label, "installing");

        self.db.open_generation(&self.build_label).await?;

        let report = self.seed().await;
        if report.is_total_failure() {
            let err = AgentError::SeedPartial { failed: report.failures.len(), total: report.attempted() };
            tracing::warn!(error = %err, "shell seed failed entirely, continuing with degraded cache");
        } else if !report.failures.is_empty() {
            let err = AgentError::SeedPartial { failed: report.failures.len(), total: report.attempted() };
            tracing::warn!(error = %err, failures = ?report.failures, "shell seed incomplete, proceeding anyway");
        }

        self.set_phase(LifecyclePhase::Waiting).await;

        // Force the waiting instance to become the active one.
        tracing::info!(build = %self.build_label, "skipping wait, forcing activation");
        self.set_phase(LifecyclePhase::Activating).await;

        Ok(report)
    }

    /// Seed every manifest entry not already present, fetching over the
    /// network. One unreachable resource never aborts the rest.
    async fn seed(&self) -> SeedReport {
        let mut report = SeedReport::default();

        for path in &self.shell_manifest {
            let url = match self.origin.join(path) {
                Ok(url) => url,
                Err(err) => {
                    report.failures.push((path.clone(), format!("invalid manifest path: {}", err)));
                    continue;
                }
            };

            let identity = request_identity("GET", url.as_str());
            match self.db.contains_artifact(&self.build_label, &identity).await {
                Ok(true) => {
                    report.already_present += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    report.failures.push((path.clone(), err.to_string()));
                    continue;
                }
            }

            match self.network.get(&url).await {
                Ok(response) if response.status.is_success() => {
                    let artifact = ResponseArtifact::new(
                        "GET",
                        url.as_str(),
                        response.status.as_u16(),
                        response.header_pairs(),
                        response.bytes.to_vec(),
                    );
                    match self.db.put_artifact(&self.build_label, &artifact).await {
                        Ok(()) => report.seeded += 1,
                        Err(err) => report.failures.push((path.clone(), err.to_string())),
                    }
                }
                Ok(response) => {
                    report
                        .failures
                        .push((path.clone(), format!("status {}", response.status.as_u16())));
                }
                Err(err) => report.failures.push((path.clone(), err.to_string())),
            }
        }

        tracing::info!(
            seeded = report.seeded,
            already_present = report.already_present,
            failed = report.failures.len(),
            "shell seed finished"
        );
        report
    }

    /// Run the activate phase: claim the pointer, evict stale
    /// generations, take over all consumers.
    pub async fn activate(&self) -> Result<(), AgentError> {
        self.set_phase(LifecyclePhase::Activating).await;
        tracing::info!(build = %self.build_label, "activating");

        // Claim the pointer first so the eviction guard protects the new
        // generation, not the one being replaced.
        self.db.set_current_generation(&self.build_label).await?;

        for label in self.db.list_generations().await? {
            if label != self.build_label {
                tracing::info!(stale = %label, "evicting stale generation");
                self.db.evict_generation(&label).await?;
            }
        }

        self.windows.claim().await;

        self.set_phase(LifecyclePhase::Active).await;
        tracing::info!(build = %self.build_label, "active");
        Ok(())
    }

    /// Mark this instance superseded by a newer build.
    pub async fn retire(&self) {
        self.set_phase(LifecyclePhase::Redundant).await;
        tracing::info!(build = %self.build_label, "redundant");
    }
}

/// Handler for install triggers.
pub struct InstallHandler<N> {
    lifecycle: Arc<Lifecycle<N>>,
}

impl<N> InstallHandler<N> {
    pub fn new(lifecycle: Arc<Lifecycle<N>>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl<N: Network + 'static> EventHandler for InstallHandler<N> {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::Install = event else {
            return Ok(());
        };
        self.lifecycle.install().await.map(|_| ())
    }
}

/// Handler for activate triggers.
pub struct ActivateHandler<N> {
    lifecycle: Arc<Lifecycle<N>>,
}

impl<N> ActivateHandler<N> {
    pub fn new(lifecycle: Arc<Lifecycle<N>>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl<N: Network + 'static> EventHandler for ActivateHandler<N> {
    async fn handle(&self, event: HostEvent) -> Result<(), AgentError> {
        let HostEvent::Activate = event else {
            return Ok(());
        };
        self.lifecycle.activate().await
    }
}
