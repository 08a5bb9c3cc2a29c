//! Heartbeat-driven failure detection
//!
//! Every round probes each registration's heartbeat endpoint concurrently.
//! The first failed attempt removes the registration at once so dependents
//! hear about it promptly; the remaining attempts only decide whether it is
//! re-admitted before the round ends. A flapping service is therefore seen by
//! dependents as a removal followed by an addition.

use crate::{config::HeartbeatConfig, error::Error, models::Registration, registry::Registry};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where a registration stands within one probe round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Last attempt succeeded
    Healthy,
    /// Round started, no outcome yet
    Probing,
    /// Removed from the table after a failed attempt
    Removed,
}

/// Table mutation required by a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// Remove the registration and notify dependents
    Remove,
    /// Add the registration back and notify dependents
    Readmit,
}

impl ProbeState {
    /// Transition on a successful attempt
    pub fn on_success(self) -> (Self, Option<ProbeAction>) {
        match self {
            ProbeState::Removed => (ProbeState::Healthy, Some(ProbeAction::Readmit)),
            ProbeState::Healthy | ProbeState::Probing => (ProbeState::Healthy, None),
        }
    }

    /// Transition on a failed attempt
    pub fn on_failure(self) -> (Self, Option<ProbeAction>) {
        match self {
            ProbeState::Removed => (ProbeState::Removed, None),
            ProbeState::Healthy | ProbeState::Probing => {
                (ProbeState::Removed, Some(ProbeAction::Remove))
            }
        }
    }
}

/// Periodic liveness prober over a [`Registry`]
pub struct FailureDetector {
    registry: Arc<Registry>,
    config: HeartbeatConfig,
}

impl FailureDetector {
    /// Create a detector
    pub fn new(registry: Arc<Registry>, config: HeartbeatConfig) -> Self {
        Self { registry, config }
    }

    /// Run rounds forever in a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run rounds forever, pausing `interval` between them
    pub async fn run(self) {
        info!(
            "Failure detector started: every {:?}, {} attempts",
            self.config.interval(),
            self.config.attempts
        );
        loop {
            self.run_round().await;
            tokio::time::sleep(self.config.interval()).await;
        }
    }

    /// Probe every current registration once; returns final states by service URL
    pub async fn run_round(&self) -> Vec<(String, ProbeState)> {
        let snapshot = self.registry.list().await;
        debug!("Heartbeat round over {} registrations", snapshot.len());

        let probes = snapshot.into_iter().map(|reg| async move {
            let state = self.probe_registration(&reg).await;
            (reg.service_url, state)
        });
        join_all(probes).await
    }

    async fn probe_registration(&self, reg: &Registration) -> ProbeState {
        let transport = self.registry.transport();
        let mut state = ProbeState::Probing;

        for attempt in 1..=self.config.attempts {
            let (next, action) = match transport.probe(&reg.heartbeat_url).await {
                Ok(()) => {
                    debug!("Heartbeat check passed for {}", reg.service_name);
                    state.on_success()
                }
                Err(e) => {
                    warn!(
                        "Heartbeat check failed for {} (attempt {}/{}): {}",
                        reg.service_name, attempt, self.config.attempts, e
                    );
                    state.on_failure()
                }
            };
            state = next;

            if let Some(action) = action {
                self.apply(action, reg).await;
            }
            if state == ProbeState::Healthy {
                break;
            }
            if attempt < self.config.attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        state
    }

    async fn apply(&self, action: ProbeAction, reg: &Registration) {
        match action {
            ProbeAction::Remove => match self.registry.remove(&reg.service_url).await {
                Ok(_) => {}
                Err(Error::ServiceNotFound(_)) => {
                    debug!("{} already gone from the table", reg.service_url);
                }
                Err(e) => error!("Failed to remove {}: {}", reg.service_url, e),
            },
            ProbeAction::Readmit => {
                info!("{} recovered, re-registering", reg.service_name);
                if let Err(e) = self.registry.add(reg.clone()).await {
                    warn!("Failed to re-register {}: {}", reg.service_url, e);
                }
            }
        }
    }
}
