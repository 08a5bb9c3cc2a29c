//! Patch fan-out to dependent services
//!
//! A registry mutation produces one full patch. Each registration gets the
//! part of it that matches its declared dependencies, pushed to its update
//! endpoint. Broadcast pushes are fire-and-forget: one spawned task per
//! target, failures logged and dropped. The initial push to a newly admitted
//! registration is awaited so its failure reaches the registering caller.

use crate::{
    error::Result,
    models::{Patch, PatchEntry, Registration},
    transport::Transport,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Patches destined for one registration's update endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Update endpoint of the target
    pub target: String,
    /// One filtered patch per matching required service, in declaration order
    pub patches: Vec<Patch>,
}

/// Compute which registrations must hear about `full`, and what each gets
pub fn plan(registrations: &[Registration], full: &Patch) -> Vec<Delivery> {
    registrations
        .iter()
        .filter_map(|reg| {
            let patches: Vec<Patch> = reg
                .required_services
                .iter()
                .map(|name| full.filter_for(name))
                .filter(|patch| !patch.is_empty())
                .collect();

            if patches.is_empty() {
                None
            } else {
                Some(Delivery {
                    target: reg.service_update_url.clone(),
                    patches,
                })
            }
        })
        .collect()
}

/// Current providers of everything `registration` requires, as one Added-only patch
pub fn initial_patch(registration: &Registration, registrations: &[Registration]) -> Patch {
    let added: Vec<PatchEntry> = registrations
        .iter()
        .flat_map(|provider| {
            registration
                .required_services
                .iter()
                .filter(move |name| **name == provider.service_name)
                .map(move |_| provider.as_entry())
        })
        .collect();

    Patch {
        added,
        removed: Vec::new(),
    }
}

/// Pushes patches through a [`Transport`]
#[derive(Clone)]
pub struct PatchDispatcher {
    transport: Arc<dyn Transport>,
}

impl PatchDispatcher {
    /// Create a dispatcher
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Broadcast `full` to every dependent in `snapshot` without waiting.
    ///
    /// Returns the number of targets a push task was spawned for.
    pub fn notify(&self, snapshot: &[Registration], full: &Patch) -> usize {
        let deliveries = plan(snapshot, full);
        let count = deliveries.len();

        for delivery in deliveries {
            let transport = self.transport.clone();
            tokio::spawn(async move {
                for patch in &delivery.patches {
                    if let Err(e) = transport.send_patch(&delivery.target, patch).await {
                        warn!("Failed to push update to {}: {}", delivery.target, e);
                        return;
                    }
                }
            });
        }

        debug!("Dispatched patch to {} dependents", count);
        count
    }

    /// Push the current providers of its dependencies to a new registration
    pub async fn send_required_services(
        &self,
        registration: &Registration,
        snapshot: &[Registration],
    ) -> Result<()> {
        let patch = initial_patch(registration, snapshot);
        debug!(
            "Sending {} initial providers to {}",
            patch.added.len(),
            registration.service_name
        );
        self.transport
            .send_patch(&registration.service_update_url, &patch)
            .await
    }
}
