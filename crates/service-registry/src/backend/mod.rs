//! Snapshot stores for the registration table

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::{error::Result, models::Registration};
use async_trait::async_trait;

/// Trait for registration table snapshot stores
///
/// A snapshot is always the whole table; stores overwrite wholesale.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    async fn save(&self, registrations: &[Registration]) -> Result<()>;

    /// Read the stored snapshot. A store that was never written is empty.
    async fn load(&self) -> Result<Vec<Registration>>;
}
