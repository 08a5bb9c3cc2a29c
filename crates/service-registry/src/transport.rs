//! Outbound calls from the registry to registered services

use crate::{
    error::{Error, Result},
    models::Patch,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Registry-to-service calls: patch pushes and liveness probes
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a patch to a service's update endpoint
    async fn send_patch(&self, url: &str, patch: &Patch) -> Result<()>;

    /// Probe a heartbeat endpoint; `Ok` means alive
    async fn probe(&self, url: &str) -> Result<()>;
}

/// HTTP transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_patch(&self, url: &str, patch: &Patch) -> Result<()> {
        debug!(
            "Sending patch to {}: +{} -{}",
            url,
            patch.added.len(),
            patch.removed.len()
        );

        let res = self.client.post(url).json(patch).send().await?;
        check_status(url, res.status())
    }

    async fn probe(&self, url: &str) -> Result<()> {
        let res = self.client.get(url).send().await?;
        check_status(url, res.status())
    }
}

fn check_status(url: &str, status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
