//! Refresh orchestration
//!
//! Runs the freshness check → fetch → enhance → persist pipeline for each
//! enhancer. Every failure is caught here, logged, and reported to telemetry;
//! none of them escape to the caller.
//!
//! Refreshes are serialized per artifact: while one run is in flight, further
//! triggers for the same artifact are folded into a single queued re-run
//! (force flags OR-ed together).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{serialize_artifact, ArtifactId, CacheStore};
use crate::checksum::Checksum;
use crate::config::SettingsSource;
use crate::enhance::SchemaEnhancer;
use crate::error::{EnhancerError, Result};
use crate::fetch::SchemaFetcher;
use crate::freshness::{check_status, FreshnessStatus};
use crate::telemetry::{TelemetryEvent, TelemetryProperties, TelemetrySink};
use crate::watch::ConfigWatcher;

/// Collaborators shared by every pipeline, created once at process start
#[derive(Clone)]
pub struct EnhancerContext {
    pub settings: Arc<dyn SettingsSource>,
    pub fetcher: Arc<dyn SchemaFetcher>,
    pub store: Arc<dyn CacheStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

/// What started a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    /// Explicit user command; always refreshes
    Command,
    ConfigurationChanged,
}

impl RefreshReason {
    pub fn forced(self) -> bool {
        self == RefreshReason::Command
    }
}

/// Result of one refresh request
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The artifact was current and the refresh was not forced
    Skipped { status: FreshnessStatus },
    Refreshed { previous: FreshnessStatus, checksum: Checksum },
    Failed { previous: FreshnessStatus, error: EnhancerError },
    /// Another run for the same artifact was in flight; it will re-run once more
    Coalesced,
}

impl RefreshOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RefreshOutcome::Failed { .. })
    }

    /// Short status line for interactive refreshes
    pub fn status_message(&self) -> &'static str {
        match self {
            RefreshOutcome::Failed { .. } => "refresh failed",
            RefreshOutcome::Coalesced => "refresh queued",
            RefreshOutcome::Skipped { .. } | RefreshOutcome::Refreshed { .. } => "refresh complete",
        }
    }
}

/// Runs the enhancer pipelines
pub struct Orchestrator {
    context: EnhancerContext,
    enhancers: Vec<Arc<dyn SchemaEnhancer>>,
    gate: RefreshGate,
}

impl Orchestrator {
    pub fn new(context: EnhancerContext, enhancers: Vec<Arc<dyn SchemaEnhancer>>) -> Self {
        Self {
            context,
            enhancers,
            gate: RefreshGate::default(),
        }
    }

    pub fn enhancers(&self) -> &[Arc<dyn SchemaEnhancer>] {
        &self.enhancers
    }

    /// Run every pipeline concurrently
    pub async fn refresh_all(&self, reason: RefreshReason) -> Vec<(&'static str, RefreshOutcome)> {
        info!(?reason, "refresh pass");
        let runs = self.enhancers.iter().map(|enhancer| async move {
            (enhancer.name(), self.refresh(enhancer, reason.forced()).await)
        });
        join_all(runs).await
    }

    /// Refresh one pipeline by enhancer name
    pub async fn refresh_named(&self, name: &str, force: bool) -> Option<RefreshOutcome> {
        let enhancer = self.enhancers.iter().find(|e| e.name() == name)?;
        Some(self.refresh(enhancer, force).await)
    }

    /// Refresh one pipeline, serialized against other runs for the same artifact
    pub async fn refresh(&self, enhancer: &Arc<dyn SchemaEnhancer>, force: bool) -> RefreshOutcome {
        let artifact = enhancer.artifact_id();
        if !self.gate.try_begin(&artifact, force) {
            debug!(%artifact, force, "refresh already in flight, queued");
            return RefreshOutcome::Coalesced;
        }

        let mut claim = GateClaim {
            gate: &self.gate,
            artifact: &artifact,
            held: true,
        };
        let mut force = force;
        loop {
            let outcome = self.run_once(enhancer.as_ref(), &artifact, force).await;
            match claim.finish() {
                Some(queued_force) => {
                    debug!(%artifact, force = queued_force, "running queued refresh");
                    force = queued_force;
                }
                None => return outcome,
            }
        }
    }

    /// Current freshness of every artifact
    pub async fn statuses(&self) -> Vec<(ArtifactId, FreshnessStatus)> {
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(self.enhancers.len());
        for enhancer in &self.enhancers {
            let artifact = enhancer.artifact_id();
            let status = check_status(self.context.store.as_ref(), &artifact, now).await;
            statuses.push((artifact, status));
        }
        statuses
    }

    /// Startup pass, then a pass for every settings change until `shutdown` resolves
    pub async fn watch<F>(self: &Arc<Self>, mut watcher: ConfigWatcher, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut running: Vec<JoinHandle<()>> = vec![self.spawn_refresh_all(RefreshReason::Startup)];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                changed = watcher.changed() => {
                    if changed.is_none() {
                        warn!("settings watcher closed");
                        break;
                    }
                    info!("configuration changed");
                    running.retain(|handle| !handle.is_finished());
                    running.push(self.spawn_refresh_all(RefreshReason::ConfigurationChanged));
                }
                _ = &mut shutdown => break,
            }
        }

        for handle in running {
            let _ = handle.await;
        }
    }

    fn spawn_refresh_all(self: &Arc<Self>, reason: RefreshReason) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.refresh_all(reason).await;
        })
    }

    async fn run_once(
        &self,
        enhancer: &dyn SchemaEnhancer,
        artifact: &ArtifactId,
        force: bool,
    ) -> RefreshOutcome {
        let previous = check_status(self.context.store.as_ref(), artifact, Utc::now()).await;
        match previous {
            FreshnessStatus::Current => info!(%artifact, "local schema is current"),
            FreshnessStatus::OutOfDate => warn!(%artifact, "schema is old"),
            FreshnessStatus::Missing => warn!(%artifact, "local schema not found"),
            FreshnessStatus::Unknown => warn!(%artifact, "local schema status unknown"),
        }

        if !force && !previous.needs_refresh() {
            return RefreshOutcome::Skipped { status: previous };
        }

        let properties = TelemetryProperties::new(artifact, previous);
        let telemetry = &self.context.telemetry;
        telemetry.send_event(TelemetryEvent::RefreshTriggered, &properties);

        match self.pipeline(enhancer, artifact).await {
            Ok(checksum) => {
                info!(%artifact, checksum = checksum.short(), "schema refresh complete");
                let properties = properties.with("checksum", checksum.as_str());
                telemetry.send_event(TelemetryEvent::RefreshComplete, &properties);
                RefreshOutcome::Refreshed { previous, checksum }
            }
            Err(error) => {
                error!(%artifact, %error, "schema refresh failed");
                telemetry.send_event(TelemetryEvent::RefreshFailed, &properties);
                telemetry.send_exception(&error, &properties);
                RefreshOutcome::Failed { previous, error }
            }
        }
    }

    /// Fetch, enhance and persist; nothing is written unless every step succeeds
    async fn pipeline(&self, enhancer: &dyn SchemaEnhancer, artifact: &ArtifactId) -> Result<Checksum> {
        let settings = self.context.settings.load()?;
        let url = settings.url_for(enhancer.configuration_key())?;

        let schema = self.context.fetcher.fetch(url).await?;
        let enhanced = enhancer.enhance(schema)?;

        let bytes = serialize_artifact(&enhanced)?;
        let checksum = Checksum::from_bytes(&bytes);
        self.context
            .store
            .write_all(artifact, &bytes)
            .await
            .map_err(|source| EnhancerError::CacheIo {
                artifact: artifact.to_string(),
                source,
            })?;
        Ok(checksum)
    }
}

/// One in-flight refresh per artifact, with at most one queued re-run
#[derive(Debug, Default)]
struct RefreshGate {
    /// Present while a run is in flight; the value is the queued re-run's force flag
    slots: Mutex<HashMap<ArtifactId, Option<bool>>>,
}

impl RefreshGate {
    /// Claim the artifact, or queue a re-run if it is already claimed
    fn try_begin(&self, artifact: &ArtifactId, force: bool) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(artifact) {
            Some(queued) => {
                *queued = Some(queued.unwrap_or(false) || force);
                false
            }
            None => {
                slots.insert(artifact.clone(), None);
                true
            }
        }
    }

    /// Release the artifact, or hand back the queued re-run's force flag
    fn finish(&self, artifact: &ArtifactId) -> Option<bool> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let queued = slots.get_mut(artifact)?.take();
        if queued.is_none() {
            slots.remove(artifact);
        }
        queued
    }

    /// Drop the artifact's slot along with any queued re-run
    fn release(&self, artifact: &ArtifactId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(artifact);
    }
}

/// A claimed gate slot; released on drop if the refresh is cancelled mid-run
struct GateClaim<'a> {
    gate: &'a RefreshGate,
    artifact: &'a ArtifactId,
    held: bool,
}

impl GateClaim<'_> {
    fn finish(&mut self) -> Option<bool> {
        let queued = self.gate.finish(self.artifact);
        self.held = queued.is_some();
        queued
    }
}

impl Drop for GateClaim<'_> {
    fn drop(&mut self) {
        if self.held {
            warn!(artifact = %self.artifact, "refresh cancelled, releasing artifact");
            self.gate.release(self.artifact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_single_claim() {
        let gate = RefreshGate::default();
        let artifact = ArtifactId::new("serve.schema.json");

        assert!(gate.try_begin(&artifact, false));
        assert_eq!(gate.finish(&artifact), None);
        assert!(gate.try_begin(&artifact, false));
    }

    #[test]
    fn test_gate_queues_depth_one_and_merges_force() {
        let gate = RefreshGate::default();
        let artifact = ArtifactId::new("sitescript.schema.json");

        assert!(gate.try_begin(&artifact, false));
        assert!(!gate.try_begin(&artifact, false));
        assert!(!gate.try_begin(&artifact, true));
        assert!(!gate.try_begin(&artifact, false));

        assert_eq!(gate.finish(&artifact), Some(true));
        assert_eq!(gate.finish(&artifact), None);
        assert!(gate.try_begin(&artifact, false));
    }

    #[test]
    fn test_gate_artifacts_are_independent() {
        let gate = RefreshGate::default();
        assert!(gate.try_begin(&ArtifactId::new("a"), false));
        assert!(gate.try_begin(&ArtifactId::new("b"), false));
    }

    #[test]
    fn test_dropped_claim_releases_slot() {
        let gate = RefreshGate::default();
        let artifact = ArtifactId::new("serve.schema.json");

        assert!(gate.try_begin(&artifact, false));
        assert!(!gate.try_begin(&artifact, true));
        drop(GateClaim {
            gate: &gate,
            artifact: &artifact,
            held: true,
        });

        assert!(gate.try_begin(&artifact, false));
        assert_eq!(gate.finish(&artifact), None);
    }

    #[test]
    fn test_finished_claim_leaves_slot_free() {
        let gate = RefreshGate::default();
        let artifact = ArtifactId::new("serve.schema.json");

        assert!(gate.try_begin(&artifact, false));
        let mut claim = GateClaim {
            gate: &gate,
            artifact: &artifact,
            held: true,
        };
        assert_eq!(claim.finish(), None);
        drop(claim);

        assert!(gate.try_begin(&artifact, false));
        assert!(!gate.try_begin(&artifact, false));
    }

    #[test]
    fn test_only_commands_force() {
        assert!(RefreshReason::Command.forced());
        assert!(!RefreshReason::Startup.forced());
        assert!(!RefreshReason::ConfigurationChanged.forced());
    }
}
