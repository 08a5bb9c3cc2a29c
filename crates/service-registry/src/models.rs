//! Data models for the service registry
//!
//! Field names on the wire follow the registry's JSON protocol exactly
//! (`ServiceName`, `ServiceURL`, `Added`, `Name`, ...). Array fields accept
//! `null` as well as absence and decode both as empty.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Well-known service names
pub mod well_known {
    /// Central log sink
    pub const LOG_SERVICE: &str = "LogService";
    /// Grade lookup service
    pub const GRADING_SERVICE: &str = "GradingService";
    /// Web portal (a consumer, not a provider)
    pub const PORTAL: &str = "Portal";
}

/// Logical service type. Not unique: many instances may share one name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a service name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ServiceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A live service instance known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registration {
    /// Logical service type
    #[serde(rename = "ServiceName")]
    pub service_name: ServiceName,

    /// Base URL of the instance, unique among live registrations
    #[serde(rename = "ServiceURL")]
    pub service_url: String,

    /// Services this instance depends on
    #[serde(rename = "RequiredServices", default, deserialize_with = "null_as_empty")]
    pub required_services: Vec<ServiceName>,

    /// Endpoint receiving pushed patches
    #[serde(rename = "ServiceUpdateURL")]
    pub service_update_url: String,

    /// Endpoint probed for liveness
    #[serde(rename = "HeartbeatURL")]
    pub heartbeat_url: String,
}

impl Registration {
    /// Create a registration using the conventional `/services` update path
    /// and `/heartbeat` liveness path under `service_url`
    pub fn new(service_name: impl Into<ServiceName>, service_url: impl Into<String>) -> Self {
        let service_url = service_url.into();
        let base = service_url.trim_end_matches('/');
        Self {
            service_name: service_name.into(),
            service_update_url: format!("{}/services", base),
            heartbeat_url: format!("{}/heartbeat", base),
            service_url,
            required_services: Vec::new(),
        }
    }

    /// Declare a dependency
    pub fn requires(mut self, name: impl Into<ServiceName>) -> Self {
        let name = name.into();
        if !self.required_services.contains(&name) {
            self.required_services.push(name);
        }
        self
    }

    /// Whether this instance declared `name` as a dependency
    pub fn depends_on(&self, name: &ServiceName) -> bool {
        self.required_services.contains(name)
    }

    /// This instance as a provider entry
    pub fn as_entry(&self) -> PatchEntry {
        PatchEntry {
            name: self.service_name.clone(),
            url: self.service_url.clone(),
        }
    }
}

/// One provider appearing or disappearing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Service name provided
    #[serde(rename = "Name")]
    pub name: ServiceName,

    /// Provider URL
    #[serde(rename = "URL")]
    pub url: String,
}

impl PatchEntry {
    /// Create a patch entry
    pub fn new(name: impl Into<ServiceName>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A delta of provider additions and removals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Providers that appeared
    #[serde(rename = "Added", default, deserialize_with = "null_as_empty")]
    pub added: Vec<PatchEntry>,

    /// Providers that disappeared
    #[serde(rename = "Removed", default, deserialize_with = "null_as_empty")]
    pub removed: Vec<PatchEntry>,
}

impl Patch {
    /// Patch announcing a single new provider
    pub fn added(entry: PatchEntry) -> Self {
        Self {
            added: vec![entry],
            removed: Vec::new(),
        }
    }

    /// Patch announcing a single departed provider
    pub fn removed(entry: PatchEntry) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![entry],
        }
    }

    /// True when the patch carries no change
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Subset of this patch concerning `name`
    pub fn filter_for(&self, name: &ServiceName) -> Patch {
        let pick = |entries: &[PatchEntry]| {
            entries
                .iter()
                .filter(|e| &e.name == name)
                .cloned()
                .collect::<Vec<_>>()
        };

        Patch {
            added: pick(&self.added),
            removed: pick(&self.removed),
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
