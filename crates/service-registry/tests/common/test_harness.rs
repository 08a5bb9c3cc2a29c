//! Test harness running a registry and services on loopback listeners

use axum::Router;
use service_registry::{
    DiscoveryClient, HttpTransport, MemoryStore, Registration, Registry, ServiceHandle,
    SnapshotStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A registry served on an ephemeral port
pub struct TestRegistry {
    /// The registry behind the server
    pub registry: Arc<Registry>,
    /// Its `/services` URL
    pub url: String,
    server: JoinHandle<()>,
}

impl TestRegistry {
    /// Start a registry without persistence
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_store(Box::new(MemoryStore::new())).await
    }

    /// Start a registry restored from `store`
    pub async fn start_with_store(store: Box<dyn SnapshotStore>) -> anyhow::Result<Self> {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(2))?);
        let registry = Arc::new(Registry::load(store, transport).await?);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/services", listener.local_addr()?);

        let server = tokio::spawn({
            let registry = registry.clone();
            async move {
                let _ = service_registry::server::serve(
                    listener,
                    registry,
                    std::future::pending::<()>(),
                )
                .await;
            }
        });

        Ok(Self {
            registry,
            url,
            server,
        })
    }

    /// Start a service of type `name` depending on `requires`
    pub async fn start_service(
        &self,
        name: &str,
        requires: &[&str],
    ) -> anyhow::Result<ServiceHandle> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);

        let registration = requires
            .iter()
            .fold(Registration::new(name, base), |reg, dep| reg.requires(*dep));

        self.start_registration(listener, registration).await
    }

    /// Serve and register an explicit registration on `listener`
    pub async fn start_registration(
        &self,
        listener: TcpListener,
        registration: Registration,
    ) -> anyhow::Result<ServiceHandle> {
        let client = DiscoveryClient::new(self.url.clone(), registration);
        Ok(client.start(listener, Router::new()).await?)
    }
}

impl Drop for TestRegistry {
    fn drop(&mut self) {
        self.server.abort();
    }
}
