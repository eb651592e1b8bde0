//! Discovery aggregation: local network announcements plus the DNS default.
//!
//! ## Local discovery as a task group
//!
//! Browsing is a tree of asynchronous sub-operations: one domain browse, one
//! service browse per (domain, service type), one resolve per announced
//! instance. Each runs as its own task in a [`JoinSet`]; a finished task may
//! spawn the next level. The set's length is the number of operations still
//! pending, and discovery is complete when it drains to zero. Failed or
//! panicked operations count as finished.
//!
//! A backend that never reports completion for some browse would keep the
//! set from draining, so the whole loop runs under
//! [`ClientConfig::discovery_timeout`](crate::ClientConfig::discovery_timeout).
//! On expiry the remaining tasks are aborted and whatever resolved so far is
//! returned.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace, warn, Instrument, Span};

use crate::{
    ApiError, ApiErrorKind, BrowseDomain, LocalDiscovery, RequestOptions, ResolvedService,
    Resolver, ScanId, ServiceInstance, ServiceType, SpaceApi, LOCAL_SERVICE_TYPES,
};

/// Result of one finished discovery sub-operation.
enum Step {
    Domains(Vec<BrowseDomain>),
    Services(Vec<ServiceInstance>),
    Resolved(ResolvedService),
    Failed,
}

/// Finds SpaceAPI endpoints without a directory.
pub struct DiscoveryAggregator {
    resolver: Arc<Resolver>,
    local: Arc<dyn LocalDiscovery>,
}

impl DiscoveryAggregator {
    /// Creates an aggregator over a local discovery backend.
    pub fn new(resolver: Arc<Resolver>, local: Arc<dyn LocalDiscovery>) -> Self {
        Self { resolver, local }
    }

    /// Whether the local discovery backend is usable.
    pub fn local_discovery_available(&self) -> bool {
        self.local.is_available()
    }

    /// Returns locally announced endpoints followed by the DNS default, if any.
    ///
    /// Endpoints are not loaded. A missing default service record is not an
    /// error.
    ///
    /// # Errors
    ///
    /// [`ApiError::Connect`] if the default-service DNS lookup itself fails.
    #[instrument(skip_all, fields(scan_id = %ScanId::new_random()))]
    pub async fn discover(&self, options: &RequestOptions) -> Result<Vec<SpaceApi>, ApiError> {
        let mut endpoints = Vec::new();

        if self.local.is_available() {
            for url in self.browse_local().await {
                match SpaceApi::parse(&url, Arc::clone(&self.resolver)) {
                    Ok(api) => endpoints.push(api.with_options(*options)),
                    Err(err) => warn!(url = %url, error = %err, "Ignoring discovered service"),
                }
            }
        } else {
            warn!("Local service discovery is unavailable; only the DNS default will be checked");
        }

        match self.default_endpoint(options).await {
            Ok(api) => endpoints.push(api),
            Err(err) if err.kind() == ApiErrorKind::Discovery => {
                debug!(error = %err, "No default service advertised");
            }
            Err(err) => return Err(err),
        }

        info!(found = endpoints.len(), "Discovery complete");
        Ok(endpoints)
    }

    /// Builds the endpoint advertised by the default service's SRV/TXT records.
    ///
    /// # Errors
    ///
    /// [`ApiError::Discovery`] if a record is absent, [`ApiError::Connect`] if
    /// the lookup fails, [`ApiError::Url`] if the records yield no usable URL.
    pub async fn default_endpoint(&self, options: &RequestOptions) -> Result<SpaceApi, ApiError> {
        let url = self.resolver.locate_default_service().await?;
        Ok(SpaceApi::parse(&url, Arc::clone(&self.resolver))?.with_options(*options))
    }

    /// Runs the local browse/resolve tree and returns one URL per resolved service.
    pub async fn browse_local(&self) -> Vec<String> {
        let mut tasks: JoinSet<Step> = JoinSet::new();
        let mut urls = Vec::new();

        let local = Arc::clone(&self.local);
        tasks.spawn(
            async move {
                match local.browse_domains().await {
                    Ok(domains) => Step::Domains(domains),
                    Err(err) => {
                        warn!(error = %err, "Domain browse failed");
                        Step::Failed
                    }
                }
            }
            .instrument(Span::current()),
        );

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                let step = match joined {
                    Ok(step) => step,
                    Err(err) => {
                        warn!(error = %err, "Discovery task did not finish");
                        Step::Failed
                    }
                };

                match step {
                    Step::Domains(domains) => {
                        for domain in domains {
                            for service_type in LOCAL_SERVICE_TYPES.iter().filter_map(|t| ServiceType::new(*t)) {
                                self.spawn_browse(&mut tasks, service_type, domain.clone());
                            }
                        }
                    }
                    Step::Services(instances) => {
                        for instance in instances {
                            self.spawn_resolve(&mut tasks, instance);
                        }
                    }
                    Step::Resolved(service) => {
                        let url = service.endpoint_url();
                        debug!(url = %url, "Resolved local service");
                        urls.push(url);
                    }
                    Step::Failed => {}
                }
                trace!(pending = tasks.len(), "Discovery operation finished");
            }
        };

        if tokio::time::timeout(self.resolver.config().discovery_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                pending = tasks.len(),
                found = urls.len(),
                "Local discovery timed out; returning partial results"
            );
            tasks.abort_all();
        }

        urls
    }

    fn spawn_browse(&self, tasks: &mut JoinSet<Step>, service_type: ServiceType, domain: BrowseDomain) {
        let local = Arc::clone(&self.local);
        tasks.spawn(
            async move {
                match local.browse_services(&service_type, &domain).await {
                    Ok(instances) => {
                        debug!(
                            service_type = %service_type,
                            domain = %domain,
                            count = instances.len(),
                            "Service browse complete"
                        );
                        Step::Services(instances)
                    }
                    Err(err) => {
                        warn!(service_type = %service_type, domain = %domain, error = %err, "Service browse failed");
                        Step::Failed
                    }
                }
            }
            .instrument(Span::current()),
        );
    }

    fn spawn_resolve(&self, tasks: &mut JoinSet<Step>, instance: ServiceInstance) {
        let local = Arc::clone(&self.local);
        tasks.spawn(
            async move {
                match local.resolve_service(&instance).await {
                    Ok(service) => Step::Resolved(service),
                    Err(err) => {
                        warn!(name = %instance.name, error = %err, "Service resolve failed");
                        Step::Failed
                    }
                }
            }
            .instrument(Span::current()),
        );
    }
}
