//! Push-based service registry and discovery over HTTP
//!
//! Services register with a single authoritative registry, declare the
//! services they depend on, are probed for liveness, and receive a patch
//! whenever the set of providers for one of their dependencies changes.
//!
//! # Architecture
//!
//! - [`Registry`] owns the registration table and its snapshot store
//! - [`FailureDetector`] probes heartbeats and removes (or re-admits) entries
//! - [`dispatch`] computes per-dependent patches and pushes them
//! - [`server`] exposes `POST`/`DELETE /services`
//! - [`DiscoveryClient`] runs inside each service: registration, heartbeat
//!   and update handlers, and a local [`ProviderCache`]
//!
//! # Example
//!
//! ```no_run
//! use service_registry::{DiscoveryClient, Registration};
//! use axum::Router;
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> service_registry::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:6000").await?;
//! let registration = Registration::new("GradingService", "http://127.0.0.1:6000")
//!     .requires("LogService");
//!
//! let client = DiscoveryClient::new("http://localhost:3000/services", registration);
//! let service = client.start(listener, Router::new()).await?;
//!
//! let log_url = service.client().lookup(&"LogService".into())?;
//! println!("logging to {}", log_url);
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod models;
pub mod registry;
pub mod server;
pub mod transport;

pub use backend::{FileStore, MemoryStore, SnapshotStore};
pub use client::{DiscoveryClient, ProviderCache, ServiceHandle};
pub use config::{ClientConfig, HeartbeatConfig, RegistryConfig, ServerConfig};
pub use dispatch::PatchDispatcher;
pub use error::{Error, Result};
pub use heartbeat::{FailureDetector, ProbeState};
pub use models::*;
pub use registry::Registry;
pub use transport::{HttpTransport, Transport};

/// Re-export key types for convenience
pub mod prelude {
    pub use crate::{
        DiscoveryClient,
        Error,
        FailureDetector,
        Patch,
        PatchEntry,
        Registration,
        Registry,
        Result,
        ServiceName,
    };
}
