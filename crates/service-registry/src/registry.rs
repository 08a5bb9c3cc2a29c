//! Authoritative registration table
//!
//! All reads and writes go through one reader/writer lock. Pushes to
//! dependents are issued against a point-in-time copy of the table, after the
//! write lock is released.

use crate::{
    backend::{MemoryStore, SnapshotStore},
    dispatch::PatchDispatcher,
    error::{Error, Result},
    models::*,
    transport::Transport,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Service registry with pluggable snapshot store
pub struct Registry {
    /// Live registrations, insertion order, one row per service URL
    registrations: RwLock<Vec<Registration>>,
    /// Snapshot store
    store: Box<dyn SnapshotStore>,
    /// Outbound calls to registered services
    transport: Arc<dyn Transport>,
    /// Patch fan-out
    dispatcher: PatchDispatcher,
}

impl Registry {
    /// Create an empty registry with a custom store
    pub fn with_store(store: Box<dyn SnapshotStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            store,
            dispatcher: PatchDispatcher::new(transport.clone()),
            transport,
        }
    }

    /// Create an empty registry without persistence
    pub fn in_memory(transport: Arc<dyn Transport>) -> Self {
        Self::with_store(Box::new(MemoryStore::new()), transport)
    }

    /// Create a registry restored from the store's snapshot
    pub async fn load(
        store: Box<dyn SnapshotStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let snapshot = store.load().await?;

        let mut registrations: Vec<Registration> = Vec::with_capacity(snapshot.len());
        for reg in snapshot {
            match registrations
                .iter_mut()
                .find(|r| r.service_url == reg.service_url)
            {
                Some(existing) => *existing = reg,
                None => registrations.push(reg),
            }
        }
        info!("Restored {} registrations", registrations.len());

        let registry = Self::with_store(store, transport);
        *registry.registrations.write().await = registrations;
        Ok(registry)
    }

    /// Admit a registration, replacing any row with the same service URL.
    ///
    /// A replaced row registered under another service name is announced to
    /// its dependents as removed.
    ///
    /// The row stays live even when persisting the snapshot fails; that
    /// failure is returned after dependents have been notified. A failed
    /// initial push to the new registration is returned as well.
    pub async fn add(&self, registration: Registration) -> Result<()> {
        info!(
            "Adding service: {} with URL: {}",
            registration.service_name, registration.service_url
        );

        let (persisted, renamed) = {
            let mut registrations = self.registrations.write().await;
            let replaced = match registrations
                .iter_mut()
                .find(|r| r.service_url == registration.service_url)
            {
                Some(existing) => Some(std::mem::replace(existing, registration.clone())),
                None => {
                    registrations.push(registration.clone());
                    None
                }
            };
            let renamed = replaced.filter(|old| old.service_name != registration.service_name);
            (self.store.save(&registrations).await, renamed)
        };
        if let Err(e) = &persisted {
            warn!("Failed to persist registry snapshot: {}", e);
        }

        let snapshot = self.list().await;
        let initial = self
            .dispatcher
            .send_required_services(&registration, &snapshot)
            .await;
        if let Err(e) = &initial {
            warn!(
                "Failed to send required services to {}: {}",
                registration.service_name, e
            );
        }

        let mut full = Patch::added(registration.as_entry());
        if let Some(old) = renamed {
            info!(
                "{} re-registered as {}, was {}",
                old.service_url, registration.service_name, old.service_name
            );
            full.removed.push(old.as_entry());
        }
        self.dispatcher.notify(&snapshot, &full);

        persisted.and(initial)
    }

    /// Remove the registration at `url` and notify its dependents
    pub async fn remove(&self, url: &str) -> Result<Registration> {
        let (removed, snapshot) = {
            let mut registrations = self.registrations.write().await;
            let index = registrations
                .iter()
                .position(|r| r.service_url == url)
                .ok_or_else(|| Error::ServiceNotFound(url.to_string()))?;

            // Dependents are computed before the row goes away
            let snapshot = registrations.clone();
            let removed = registrations.remove(index);

            if let Err(e) = self.store.save(&registrations).await {
                warn!("Failed to persist registry snapshot: {}", e);
            }
            (removed, snapshot)
        };

        info!(
            "Removed service: {} at URL: {}",
            removed.service_name, removed.service_url
        );
        self.dispatcher
            .notify(&snapshot, &Patch::removed(removed.as_entry()));

        Ok(removed)
    }

    /// Broadcast a patch to every dependent
    pub async fn notify(&self, full: &Patch) -> usize {
        let snapshot = self.list().await;
        self.dispatcher.notify(&snapshot, full)
    }

    /// Point-in-time copy of the table
    pub async fn list(&self) -> Vec<Registration> {
        self.registrations.read().await.clone()
    }

    /// Registration at `url`, if live
    pub async fn get(&self, url: &str) -> Option<Registration> {
        self.registrations
            .read()
            .await
            .iter()
            .find(|r| r.service_url == url)
            .cloned()
    }

    /// Live providers of `name`
    pub async fn providers(&self, name: &ServiceName) -> Vec<String> {
        self.registrations
            .read()
            .await
            .iter()
            .filter(|r| &r.service_name == name)
            .map(|r| r.service_url.clone())
            .collect()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
