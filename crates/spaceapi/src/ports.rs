//! Port traits for the external collaborators.
//!
//! The domain never opens a socket or touches the file system itself. It
//! reaches HTTP, DNS, local service discovery and cache storage through the
//! traits below; adapter crates (`http-transport`, `dns`, `mdns`, `store`)
//! provide the concrete implementations and the CLI wires them together.
//!
//! Every trait is object-safe via [`async_trait`] so components can hold
//! `Arc<dyn Trait>` and tests can substitute hand-written fakes.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    BrowseDomain, HealthCache, HttpResponse, ResolvedService, ServiceInstance, ServiceType,
    SrvRecord,
};

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Per-request transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
    /// Total request timeout; `None` leaves it to the transport's own default.
    pub timeout: Option<Duration>,
}

/// Failures that prevent a usable response from being obtained.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request did not complete within its timeout.
    #[error("Request timed out")]
    Timeout,

    /// Any other transport failure (invalid request, broken body stream).
    #[error("Transport error: {0}")]
    Other(String),
}

/// Performs HTTP GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url`, returning whatever the server answered regardless of status code.
    async fn get(&self, url: &str, options: &TransportOptions) -> Result<HttpResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

/// DNS lookup failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    /// The name exists in no form the query asked for (NXDOMAIN or no records).
    #[error("No {record} record found for {name}")]
    NotFound {
        /// Queried name.
        name: String,
        /// Record type (`SRV`, `TXT`).
        record: &'static str,
    },

    /// The resolver could not complete the query.
    #[error("DNS lookup failed: {0}")]
    Transport(String),
}

/// Performs DNS SRV and TXT lookups.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns the preferred SRV record for `name`.
    async fn query_srv(&self, name: &str) -> Result<SrvRecord, DnsError>;

    /// Returns every TXT record for `name`, each as its list of character strings.
    async fn query_txt(&self, name: &str) -> Result<Vec<Vec<String>>, DnsError>;
}

// ---------------------------------------------------------------------------
// Local service discovery
// ---------------------------------------------------------------------------

/// Local discovery failures. Each one ends the sub-operation it occurred in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocalDiscoveryError {
    /// The platform discovery backend is not available.
    #[error("Local service discovery is unavailable: {0}")]
    Unavailable(String),

    /// A domain or service browse failed.
    #[error("Browse failed: {0}")]
    BrowseFailed(String),

    /// A discovered instance could not be resolved.
    #[error("Could not resolve service '{name}': {reason}")]
    ResolveFailed {
        /// Instance name.
        name: String,
        /// Why resolution failed.
        reason: String,
    },
}

/// Browses the local network for announced services.
///
/// Each method is one asynchronous sub-operation; the aggregator runs them as
/// independent tasks and counts them down to completion.
#[async_trait]
pub trait LocalDiscovery: Send + Sync {
    /// Whether a working backend is present. When `false` the aggregator skips
    /// local discovery entirely.
    fn is_available(&self) -> bool;

    /// Lists the browse domains reachable from this host.
    async fn browse_domains(&self) -> Result<Vec<BrowseDomain>, LocalDiscoveryError>;

    /// Lists instances of `service_type` announced in `domain`.
    async fn browse_services(
        &self,
        service_type: &ServiceType,
        domain: &BrowseDomain,
    ) -> Result<Vec<ServiceInstance>, LocalDiscoveryError>;

    /// Resolves an instance to host, port and TXT metadata.
    async fn resolve_service(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ResolvedService, LocalDiscoveryError>;
}

// ---------------------------------------------------------------------------
// Health cache storage
// ---------------------------------------------------------------------------

/// Health cache persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The cache could not be encoded.
    #[error("Could not encode health cache: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Loads and saves the directory health cache.
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Loads the persisted cache. Absent or unreadable storage yields an empty cache.
    async fn load(&self) -> HealthCache;

    /// Replaces the persisted cache with `cache`.
    async fn save(&self, cache: &HealthCache) -> Result<(), StoreError>;
}
