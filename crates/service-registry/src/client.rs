//! Discovery client embedded in every dependent service
//!
//! The client registers its service with the registry, answers heartbeat
//! probes, applies pushed patches to a local [`ProviderCache`] and picks a
//! provider at random when asked.

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    models::*,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{any, post},
    Router,
};
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Push-maintained view of providers per service name
///
/// Keys are never dropped: a name whose providers all left maps to an empty
/// list.
#[derive(Debug, Default)]
pub struct ProviderCache {
    services: RwLock<HashMap<ServiceName, Vec<String>>>,
}

impl ProviderCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a patch. Duplicate adds and unknown removes are no-ops.
    pub fn apply(&self, patch: &Patch) {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);

        for entry in &patch.added {
            let urls = services.entry(entry.name.clone()).or_default();
            if !urls.contains(&entry.url) {
                urls.push(entry.url.clone());
            }
        }

        for entry in &patch.removed {
            if let Some(urls) = services.get_mut(&entry.name) {
                if let Some(index) = urls.iter().position(|url| url == &entry.url) {
                    urls.remove(index);
                }
            }
        }
    }

    /// Pick one provider of `name` uniformly at random
    pub fn get(&self, name: &ServiceName) -> Result<String> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        match services.get(name) {
            Some(urls) if !urls.is_empty() => {
                let index = rand::thread_rng().gen_range(0..urls.len());
                Ok(urls[index].clone())
            }
            _ => Err(Error::NoProviders(name.clone())),
        }
    }

    /// Known providers of `name`; `None` if the name was never seen
    pub fn providers(&self, name: &ServiceName) -> Option<Vec<String>> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services.get(name).cloned()
    }
}

/// A service's handle on the registry
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    registration: Registration,
    registry_url: String,
    http: reqwest::Client,
    timeout: Duration,
    cache: Arc<ProviderCache>,
}

impl DiscoveryClient {
    /// Create a client talking to the registry at `registry_url`, with the
    /// default registry call timeout
    pub fn new(registry_url: impl Into<String>, registration: Registration) -> Self {
        Self {
            registration,
            registry_url: registry_url.into(),
            http: reqwest::Client::new(),
            timeout: ClientConfig::default().timeout(),
            cache: Arc::new(ProviderCache::new()),
        }
    }

    /// Create a client from configuration
    pub fn from_config(config: &ClientConfig, registration: Registration) -> Self {
        Self::new(config.registry_url.clone(), registration).with_timeout(config.timeout())
    }

    /// Bound every registry call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// This service's registration record
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// The local provider cache
    pub fn cache(&self) -> &Arc<ProviderCache> {
        &self.cache
    }

    /// Pick a provider of `name` from the local cache
    pub fn lookup(&self, name: &ServiceName) -> Result<String> {
        self.cache.get(name)
    }

    /// Heartbeat and update handlers at the paths of the registration's URLs
    pub fn routes(&self) -> Result<Router> {
        let heartbeat_path = url_path(&self.registration.heartbeat_url)?;
        let update_path = url_path(&self.registration.service_update_url)?;
        if heartbeat_path == update_path {
            return Err(Error::InvalidRegistration(format!(
                "heartbeat and update share the path {}",
                heartbeat_path
            )));
        }

        Ok(Router::new()
            .route(&heartbeat_path, any(heartbeat))
            .route(&update_path, post(receive_update))
            .with_state(self.cache.clone()))
    }

    /// Register with the registry. The handlers must already be served.
    pub async fn register(&self) -> Result<()> {
        let res = self
            .http
            .post(&self.registry_url)
            .timeout(self.timeout)
            .json(&self.registration)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::UnexpectedStatus {
                url: self.registry_url.clone(),
                status: res.status().as_u16(),
            });
        }

        info!(
            "Registered {} at {}",
            self.registration.service_name, self.registration.service_url
        );
        Ok(())
    }

    /// Ask the registry to drop this service
    pub async fn deregister(&self) -> Result<()> {
        let res = self
            .http
            .delete(&self.registry_url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(self.registration.service_url.clone())
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::UnexpectedStatus {
                url: self.registry_url.clone(),
                status: res.status().as_u16(),
            });
        }

        info!("Deregistered {}", self.registration.service_url);
        Ok(())
    }

    /// Serve `app` together with the discovery handlers, then register.
    ///
    /// `app` must not route the heartbeat or update paths itself.
    pub async fn start(self, listener: TcpListener, app: Router) -> Result<ServiceHandle> {
        let local_addr = listener.local_addr()?;
        let app = app.merge(self.routes()?);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!("{} listening on {}", self.registration.service_name, local_addr);

        if let Err(e) = self.register().await {
            let _ = shutdown_tx.send(());
            let _ = server.await;
            return Err(e);
        }

        Ok(ServiceHandle {
            client: self,
            local_addr,
            shutdown_tx,
            server,
        })
    }
}

/// A running, registered service
pub struct ServiceHandle {
    client: DiscoveryClient,
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl ServiceHandle {
    /// The service's discovery client
    pub fn client(&self) -> &DiscoveryClient {
        &self.client
    }

    /// Address the service is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Deregister (best-effort, bounded by the client timeout) and stop serving
    pub async fn shutdown(self) -> Result<()> {
        if let Err(e) = self.client.deregister().await {
            warn!(
                "Failed to deregister {}: {}",
                self.client.registration.service_url, e
            );
        }

        let _ = self.shutdown_tx.send(());
        match self.server.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(std::io::Error::other(e).into()),
        }
    }
}

fn url_path(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::InvalidRegistration(format!("{}: {}", url, e)))?;
    Ok(parsed.path().to_string())
}

async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

async fn receive_update(State(cache): State<Arc<ProviderCache>>, body: Bytes) -> StatusCode {
    let patch: Patch = match serde_json::from_slice(&body) {
        Ok(patch) => patch,
        Err(e) => {
            warn!("Malformed update: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!("Update received: {:?}", patch);
    cache.apply(&patch);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use std::collections::HashSet;
    use tower::ServiceExt;

    fn log() -> ServiceName {
        ServiceName::new("LogService")
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let cache = ProviderCache::new();
        let patch = Patch::added(PatchEntry::new("LogService", "http://h:4000"));

        cache.apply(&patch);
        cache.apply(&patch);
        assert_eq!(cache.providers(&log()), Some(vec!["http://h:4000".to_string()]));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let cache = ProviderCache::new();
        cache.apply(&Patch::added(PatchEntry::new("LogService", "http://h:4000")));

        cache.apply(&Patch::removed(PatchEntry::new("LogService", "http://h:4001")));
        cache.apply(&Patch::removed(PatchEntry::new("Portal", "http://h:5000")));
        assert_eq!(cache.providers(&log()), Some(vec!["http://h:4000".to_string()]));
        assert_eq!(cache.providers(&ServiceName::new("Portal")), None);
    }

    #[test]
    fn test_add_then_remove_leaves_empty_list() {
        let cache = ProviderCache::new();
        let entry = PatchEntry::new("LogService", "http://h:4000");

        cache.apply(&Patch::added(entry.clone()));
        cache.apply(&Patch::removed(entry));
        assert_eq!(cache.providers(&log()), Some(Vec::new()));
        assert!(matches!(cache.get(&log()), Err(Error::NoProviders(_))));
    }

    #[test]
    fn test_unknown_service_has_no_providers() {
        let cache = ProviderCache::new();
        assert!(matches!(cache.get(&log()), Err(Error::NoProviders(_))));
    }

    #[test]
    fn test_get_reaches_every_provider() {
        let cache = ProviderCache::new();
        let urls = ["http://h:4000", "http://h:4001", "http://h:4002"];
        cache.apply(&Patch {
            added: urls.iter().map(|u| PatchEntry::new("LogService", *u)).collect(),
            removed: Vec::new(),
        });

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            seen.insert(cache.get(&log()).unwrap());
            if seen.len() == urls.len() {
                break;
            }
        }
        assert_eq!(seen.len(), urls.len());
    }

    #[test]
    fn test_routes_reject_shared_path() {
        let mut reg = Registration::new("LogService", "http://h:4000");
        reg.heartbeat_url = reg.service_update_url.clone();

        let client = DiscoveryClient::new("http://localhost:3000/services", reg);
        assert!(matches!(client.routes(), Err(Error::InvalidRegistration(_))));
    }

    #[test]
    fn test_routes_reject_bad_url() {
        let mut reg = Registration::new("LogService", "http://h:4000");
        reg.heartbeat_url = "not a url".to_string();

        let client = DiscoveryClient::new("http://localhost:3000/services", reg);
        assert!(client.routes().is_err());
    }

    #[tokio::test]
    async fn test_update_handler_applies_patch() {
        let client = DiscoveryClient::new(
            "http://localhost:3000/services",
            Registration::new("GradingService", "http://h:6000").requires("LogService"),
        );
        let app = client.routes().unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/services")
            .body(Body::from(
                r#"{"Added":[{"Name":"LogService","URL":"http://h:4000"}],"Removed":null}"#,
            ))
            .unwrap();
        let status = app.clone().oneshot(request).await.unwrap().status();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(client.lookup(&log()).unwrap(), "http://h:4000");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/services")
            .body(Body::from("garbage"))
            .unwrap();
        let status = app.oneshot(request).await.unwrap().status();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_heartbeat_answers_any_method() {
        let client = DiscoveryClient::new(
            "http://localhost:3000/services",
            Registration::new("LogService", "http://h:4000"),
        );
        let app = client.routes().unwrap();

        for method in [Method::GET, Method::HEAD, Method::POST] {
            let request = Request::builder()
                .method(method)
                .uri("/heartbeat")
                .body(Body::empty())
                .unwrap();
            let status = app.clone().oneshot(request).await.unwrap().status();
            assert_eq!(status, StatusCode::OK);
        }
    }

    /// Registry that accepts registrations and never answers deregistrations
    async fn stalling_registry() -> String {
        let app = Router::new().route(
            "/services",
            post(|| async { StatusCode::OK }).delete(|| std::future::pending::<StatusCode>()),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/services", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await });
        url
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig {
            registry_url: "http://reg:3000/services".to_string(),
            timeout_ms: 250,
        };
        let client =
            DiscoveryClient::from_config(&config, Registration::new("LogService", "http://h:4000"));

        assert_eq!(client.registry_url, "http://reg:3000/services");
        assert_eq!(client.timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_shutdown_is_bounded_by_timeout() {
        let registry_url = stalling_registry().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = DiscoveryClient::new(
            registry_url,
            Registration::new("LogService", format!("http://{}", addr)),
        )
        .with_timeout(Duration::from_millis(200));
        let service = client.start(listener, Router::new()).await.unwrap();
        assert_eq!(service.local_addr(), addr);

        let stopped = tokio::time::timeout(Duration::from_secs(5), service.shutdown()).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_start_fails_when_registry_is_silent() {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry_url = format!("http://{}/services", silent.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = silent.accept().await {
                held.push(socket);
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let client = DiscoveryClient::new(registry_url, Registration::new("LogService", base))
            .with_timeout(Duration::from_millis(200));

        let started = tokio::time::timeout(
            Duration::from_secs(5),
            client.start(listener, Router::new()),
        )
        .await
        .expect("start hung on a silent registry");
        assert!(matches!(started, Err(Error::Http(e)) if e.is_timeout()));
    }
}
