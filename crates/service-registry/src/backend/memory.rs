//! In-memory snapshot store

use super::SnapshotStore;
use crate::{error::Result, models::Registration};
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

/// In-memory snapshot store, used when persistence is disabled
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Vec<Registration>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a snapshot
    pub fn with_snapshot(registrations: Vec<Registration>) -> Self {
        Self {
            snapshot: RwLock::new(registrations),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, registrations: &[Registration]) -> Result<()> {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *snapshot = registrations.to_vec();
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Registration>> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Ok(snapshot.clone())
    }
}
