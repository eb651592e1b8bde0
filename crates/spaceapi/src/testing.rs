//! Hand-written port fakes with call recording.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    BrowseDomain, DnsError, HttpResponse, LocalDiscovery, LocalDiscoveryError, NameResolver,
    ResolvedService, ServiceInstance, ServiceType, SrvRecord, Transport, TransportError,
    TransportOptions,
};

pub(crate) type Reply = Result<HttpResponse, TransportError>;

pub(crate) fn json(body: &str) -> Reply {
    Ok(HttpResponse::new(
        200,
        [("content-type".to_string(), "application/json".to_string())],
        body.to_owned(),
    ))
}

pub(crate) fn html(body: &str) -> Reply {
    Ok(HttpResponse::new(
        200,
        [("content-type".to_string(), "text/html; charset=utf-8".to_string())],
        body.to_owned(),
    ))
}

fn not_found() -> Reply {
    Ok(HttpResponse::new(
        404,
        [("content-type".to_string(), "text/plain".to_string())],
        "not found",
    ))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Answers from a fixed route table; unknown URLs get a plain-text 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
    options: Mutex<Vec<TransportOptions>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, url: &str, reply: Reply) -> Self {
        self.routes.insert(url.to_owned(), reply);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub(crate) fn last_options(&self) -> Option<TransportOptions> {
        self.options.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, options: &TransportOptions) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_owned());
        self.options.lock().unwrap().push(*options);
        self.routes.get(url).cloned().unwrap_or_else(not_found)
    }
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

pub(crate) struct MockNames {
    srv: Result<SrvRecord, DnsError>,
    txt: Result<Vec<Vec<String>>, DnsError>,
    srv_calls: Mutex<usize>,
    txt_calls: Mutex<usize>,
}

impl MockNames {
    fn with(srv: Result<SrvRecord, DnsError>, txt: Result<Vec<Vec<String>>, DnsError>) -> Self {
        Self {
            srv,
            txt,
            srv_calls: Mutex::new(0),
            txt_calls: Mutex::new(0),
        }
    }

    pub(crate) fn present(target: &str, port: u16, txt: &[&str]) -> Self {
        Self::with(
            Ok(SrvRecord { target: target.to_owned(), port }),
            Ok(vec![txt.iter().map(|s| s.to_string()).collect()]),
        )
    }

    pub(crate) fn srv_only(target: &str, port: u16) -> Self {
        Self::with(
            Ok(SrvRecord { target: target.to_owned(), port }),
            Err(DnsError::NotFound { name: "default._spaceapis._tcp".into(), record: "TXT" }),
        )
    }

    pub(crate) fn absent() -> Self {
        Self::with(
            Err(DnsError::NotFound { name: "default._spaceapis._tcp".into(), record: "SRV" }),
            Err(DnsError::NotFound { name: "default._spaceapis._tcp".into(), record: "TXT" }),
        )
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with(
            Err(DnsError::Transport(message.to_owned())),
            Err(DnsError::Transport(message.to_owned())),
        )
    }

    pub(crate) fn srv_calls(&self) -> usize {
        *self.srv_calls.lock().unwrap()
    }

    pub(crate) fn txt_calls(&self) -> usize {
        *self.txt_calls.lock().unwrap()
    }
}

#[async_trait]
impl NameResolver for MockNames {
    async fn query_srv(&self, _name: &str) -> Result<SrvRecord, DnsError> {
        *self.srv_calls.lock().unwrap() += 1;
        self.srv.clone()
    }

    async fn query_txt(&self, _name: &str) -> Result<Vec<Vec<String>>, DnsError> {
        *self.txt_calls.lock().unwrap() += 1;
        self.txt.clone()
    }
}

// ---------------------------------------------------------------------------
// Local discovery
// ---------------------------------------------------------------------------

/// Serves a fixed set of services per (type, domain); instance names found in
/// `resolved` resolve, the rest fail.
#[derive(Default)]
pub(crate) struct MockLocal {
    pub(crate) unavailable: bool,
    pub(crate) domains: Vec<&'static str>,
    pub(crate) domain_browse_fails: bool,
    pub(crate) services: HashMap<(&'static str, &'static str), Vec<&'static str>>,
    pub(crate) failing_browses: Vec<(&'static str, &'static str)>,
    pub(crate) resolved: HashMap<&'static str, ResolvedService>,
    /// Service types whose browse never completes.
    pub(crate) hanging: Vec<&'static str>,
    pub(crate) resolve_calls: Mutex<usize>,
}

#[async_trait]
impl LocalDiscovery for MockLocal {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn browse_domains(&self) -> Result<Vec<BrowseDomain>, LocalDiscoveryError> {
        if self.domain_browse_fails {
            return Err(LocalDiscoveryError::BrowseFailed("domains".into()));
        }
        Ok(self.domains.iter().filter_map(|d| BrowseDomain::new(*d)).collect())
    }

    async fn browse_services(
        &self,
        service_type: &ServiceType,
        domain: &BrowseDomain,
    ) -> Result<Vec<ServiceInstance>, LocalDiscoveryError> {
        let key = (service_type.as_str(), domain.as_str());
        if self.hanging.iter().any(|h| *h == key.0) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing_browses.iter().any(|f| f.0 == key.0 && f.1 == key.1) {
            return Err(LocalDiscoveryError::BrowseFailed(format!("{}.{}", key.0, key.1)));
        }
        let names = self
            .services
            .iter()
            .find(|(k, _)| k.0 == key.0 && k.1 == key.1)
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        Ok(names
            .into_iter()
            .map(|name| ServiceInstance {
                name: name.to_owned(),
                service_type: service_type.clone(),
                domain: domain.clone(),
            })
            .collect())
    }

    async fn resolve_service(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ResolvedService, LocalDiscoveryError> {
        *self.resolve_calls.lock().unwrap() += 1;
        self.resolved
            .get(instance.name.as_str())
            .cloned()
            .ok_or_else(|| LocalDiscoveryError::ResolveFailed {
                name: instance.name.clone(),
                reason: "timeout".into(),
            })
    }
}
