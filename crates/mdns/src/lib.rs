//! SpaceAPI local discovery adapter.
//!
//! Implements [`spaceapi::LocalDiscovery`] over multicast DNS with
//! [`mdns_sd`]. Multicast DNS has a single browse domain, `local`, and no
//! end-of-results signal, so each service browse listens for a fixed window
//! and then stops. Instances resolved during that window are kept so the
//! following `resolve_service` call can answer without a second query.
//!
//! [`UnavailableLocalDiscovery`] stands in when no daemon can be started
//! (no multicast-capable interface, sandboxed host).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The daemon's blocking event channel is drained on the
//! blocking thread pool; the domain crate only sees
//! [`spaceapi::ServiceInstance`] and [`spaceapi::ResolvedService`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use spaceapi::{
    BrowseDomain, LocalDiscovery, LocalDiscoveryError, ResolvedService, ServiceInstance,
    ServiceType,
};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// The only browse domain multicast DNS serves.
pub const LOCAL_DOMAIN: &str = "local";

/// Errors starting the mDNS daemon.
#[derive(Debug, Error)]
pub enum MdnsError {
    /// The daemon could not open its sockets.
    #[error("Could not start mDNS daemon: {0}")]
    Daemon(#[from] mdns_sd::Error),
}

/// mDNS adapter configuration.
#[derive(Debug, Clone)]
pub struct MdnsConfig {
    /// How long each service browse listens for announcements.
    pub browse_window: Duration,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            browse_window: Duration::from_secs(3),
        }
    }
}

// ---------------------------------------------------------------------------
// MdnsLocalDiscovery
// ---------------------------------------------------------------------------

/// [`LocalDiscovery`] implementation over an [`mdns_sd::ServiceDaemon`].
pub struct MdnsLocalDiscovery {
    daemon: ServiceDaemon,
    config: MdnsConfig,
    /// Resolved announcements keyed by instance full name.
    resolved: Arc<Mutex<HashMap<String, ResolvedService>>>,
}

impl MdnsLocalDiscovery {
    /// Starts an mDNS daemon.
    pub fn new(config: MdnsConfig) -> Result<Self, MdnsError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            config,
            resolved: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn stash(&self, fullname: String, service: ResolvedService) {
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.insert(fullname, service);
        }
    }

    fn stashed(&self, fullname: &str) -> Option<ResolvedService> {
        self.resolved.lock().ok()?.get(fullname).cloned()
    }
}

impl Drop for MdnsLocalDiscovery {
    fn drop(&mut self) {
        if let Err(err) = self.daemon.shutdown() {
            debug!(error = %err, "mDNS daemon shutdown failed");
        }
    }
}

#[async_trait]
impl LocalDiscovery for MdnsLocalDiscovery {
    fn is_available(&self) -> bool {
        true
    }

    async fn browse_domains(&self) -> Result<Vec<BrowseDomain>, LocalDiscoveryError> {
        let domain = BrowseDomain::new(LOCAL_DOMAIN)
            .ok_or_else(|| LocalDiscoveryError::BrowseFailed("invalid browse domain".into()))?;
        Ok(vec![domain])
    }

    #[instrument(skip(self), fields(service_type = %service_type, domain = %domain))]
    async fn browse_services(
        &self,
        service_type: &ServiceType,
        domain: &BrowseDomain,
    ) -> Result<Vec<ServiceInstance>, LocalDiscoveryError> {
        let query = browse_query(service_type.as_str(), domain.as_str());
        let receiver = self
            .daemon
            .browse(&query)
            .map_err(|e| LocalDiscoveryError::BrowseFailed(e.to_string()))?;

        let window = self.config.browse_window;
        let events = tokio::task::spawn_blocking(move || {
            let deadline = Instant::now() + window;
            let mut events = Vec::new();
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                match receiver.recv_timeout(remaining) {
                    Ok(event) => events.push(event),
                    Err(_) => break,
                }
            }
            events
        })
        .await
        .map_err(|e| LocalDiscoveryError::BrowseFailed(e.to_string()))?;

        if let Err(err) = self.daemon.stop_browse(&query) {
            trace!(error = %err, "stop_browse failed");
        }

        let mut instances: Vec<ServiceInstance> = Vec::new();
        for event in events {
            let fullname = match event {
                ServiceEvent::ServiceFound(_, fullname) => fullname,
                ServiceEvent::ServiceResolved(info) => {
                    let fullname = info.get_fullname().to_owned();
                    match resolved_from_info(&info) {
                        Some(service) => self.stash(fullname.clone(), service),
                        None => warn!(name = %fullname, "Announcement carries no usable host"),
                    }
                    fullname
                }
                _ => continue,
            };

            let Some(name) = instance_name(&fullname, &query) else {
                continue;
            };
            if instances.iter().all(|i| i.name != name) {
                instances.push(ServiceInstance {
                    name,
                    service_type: service_type.clone(),
                    domain: domain.clone(),
                });
            }
        }

        debug!(count = instances.len(), "mDNS browse window closed");
        Ok(instances)
    }

    async fn resolve_service(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ResolvedService, LocalDiscoveryError> {
        let query = browse_query(instance.service_type.as_str(), instance.domain.as_str());
        let fullname = format!("{}.{}", instance.name, query);
        self.stashed(&fullname)
            .ok_or_else(|| LocalDiscoveryError::ResolveFailed {
                name: instance.name.clone(),
                reason: "no resolved announcement seen during browse".into(),
            })
    }
}

/// `_spaceapi._tcp` in `local` becomes `_spaceapi._tcp.local.`.
fn browse_query(service_type: &str, domain: &str) -> String {
    format!("{}.{}.", service_type, domain.trim_end_matches('.'))
}

/// Strips the `.{type}.{domain}.` suffix from an instance full name.
fn instance_name(fullname: &str, query: &str) -> Option<String> {
    let name = fullname.strip_suffix(query)?.strip_suffix('.')?;
    (!name.is_empty()).then(|| name.to_owned())
}

fn resolved_from_info(info: &ServiceInfo) -> Option<ResolvedService> {
    let address = info.get_addresses().iter().next().map(ToString::to_string);
    let txt = info
        .get_properties()
        .iter()
        .map(|p| format!("{}={}", p.key(), p.val_str()));
    resolved_from_parts(info.get_hostname(), address, info.get_port(), txt)
}

/// Builds a [`ResolvedService`], preferring the announced host name over an address.
fn resolved_from_parts(
    hostname: &str,
    address: Option<String>,
    port: u16,
    txt: impl IntoIterator<Item = String>,
) -> Option<ResolvedService> {
    let host = hostname.trim_end_matches('.');
    let host = if host.is_empty() { address? } else { host.to_owned() };
    Some(ResolvedService {
        host,
        port,
        txt: txt.into_iter().collect(),
    })
}

// ---------------------------------------------------------------------------
// UnavailableLocalDiscovery
// ---------------------------------------------------------------------------

/// A [`LocalDiscovery`] for hosts where no backend could be started.
#[derive(Debug, Clone)]
pub struct UnavailableLocalDiscovery {
    reason: String,
}

impl UnavailableLocalDiscovery {
    /// Records why local discovery is unavailable.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LocalDiscovery for UnavailableLocalDiscovery {
    fn is_available(&self) -> bool {
        false
    }

    async fn browse_domains(&self) -> Result<Vec<BrowseDomain>, LocalDiscoveryError> {
        Err(LocalDiscoveryError::Unavailable(self.reason.clone()))
    }

    async fn browse_services(
        &self,
        _service_type: &ServiceType,
        _domain: &BrowseDomain,
    ) -> Result<Vec<ServiceInstance>, LocalDiscoveryError> {
        Err(LocalDiscoveryError::Unavailable(self.reason.clone()))
    }

    async fn resolve_service(
        &self,
        _instance: &ServiceInstance,
    ) -> Result<ResolvedService, LocalDiscoveryError> {
        Err(LocalDiscoveryError::Unavailable(self.reason.clone()))
    }
}
