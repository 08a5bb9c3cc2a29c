//! JSON file snapshot store

use super::SnapshotStore;
use crate::{error::Result, models::Registration};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores the table as a JSON array in a single file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn save(&self, registrations: &[Registration]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec(registrations)?;
        async_fs::write(&self.path, data).await?;

        debug!("Saved {} registrations to {:?}", registrations.len(), self.path);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Registration>> {
        let data = match async_fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No snapshot at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let registrations: Option<Vec<Registration>> = serde_json::from_slice(&data)?;
        let registrations = registrations.unwrap_or_default();

        info!("Loaded {} registrations from {:?}", registrations.len(), self.path);
        Ok(registrations)
    }
}
