//! One entry point over every way of finding spaces.

use std::sync::Arc;

use tracing::debug;

use crate::{
    ApiError, ApiErrorKind, DirectoryClient, DiscoveryAggregator, HealthStore, LocalDiscovery,
    Progress, RequestOptions, Resolver, SpaceApi,
};

/// Combines the directory scan and discovery behind one object.
pub struct SpaceBrowser {
    resolver: Arc<Resolver>,
    directory: DirectoryClient,
    discovery: DiscoveryAggregator,
}

impl SpaceBrowser {
    /// Creates a browser sharing one resolver across both sources.
    pub fn new(
        resolver: Arc<Resolver>,
        store: Arc<dyn HealthStore>,
        local: Arc<dyn LocalDiscovery>,
    ) -> Self {
        Self {
            directory: DirectoryClient::new(Arc::clone(&resolver), store),
            discovery: DiscoveryAggregator::new(Arc::clone(&resolver), local),
            resolver,
        }
    }

    /// The shared resolver.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Wraps a single URL.
    pub fn endpoint(&self, url: &str) -> Result<SpaceApi, ApiError> {
        SpaceApi::parse(url, Arc::clone(&self.resolver))
    }

    /// See [`DirectoryClient::list_candidates`].
    pub async fn directory<F>(
        &self,
        options: &RequestOptions,
        progress: F,
    ) -> Result<Vec<SpaceApi>, ApiError>
    where
        F: FnMut(&Progress) + Send,
    {
        self.directory.list_candidates(options, progress).await
    }

    /// See [`DiscoveryAggregator::discover`].
    pub async fn discover(&self, options: &RequestOptions) -> Result<Vec<SpaceApi>, ApiError> {
        self.discovery.discover(options).await
    }

    /// See [`DiscoveryAggregator::default_endpoint`].
    pub async fn default_endpoint(&self, options: &RequestOptions) -> Result<SpaceApi, ApiError> {
        self.discovery.default_endpoint(options).await
    }

    /// Whether local network discovery can run on this host.
    pub fn local_discovery_available(&self) -> bool {
        self.discovery.local_discovery_available()
    }

    /// Directory results followed by discovery results.
    ///
    /// A discovery failure of kind [`ApiErrorKind::Discovery`] leaves the
    /// directory results standing; any other failure propagates.
    pub async fn all<F>(&self, options: &RequestOptions, progress: F) -> Result<Vec<SpaceApi>, ApiError>
    where
        F: FnMut(&Progress) + Send,
    {
        let mut found = self.directory(options, progress).await?;
        match self.discover(options).await {
            Ok(discovered) => found.extend(discovered),
            Err(err) if err.kind() == ApiErrorKind::Discovery => {
                debug!(error = %err, "Discovery found nothing");
            }
            Err(err) => return Err(err),
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::{json, MockLocal, MockNames, MockTransport};
    use crate::{ClientConfig, MemoryHealthStore, ResolvedService};

    #[tokio::test]
    async fn all_appends_discovery_to_directory() {
        let transport = Arc::new(
            MockTransport::new()
                .route("http://dir.test/", json(r#"[{"website": "http://good.org/"}]"#))
                .route("http://good.org/", json(r#"{"space":"Good"}"#)),
        );
        let config = ClientConfig::builder().directory_url("http://dir.test/").build();
        let resolver = Arc::new(Resolver::new(transport, Arc::new(MockNames::absent()), config));
        let local = MockLocal {
            domains: vec!["local"],
            services: HashMap::from([(("_spaceapi._tcp", "local"), vec!["Lan"])]),
            resolved: HashMap::from([(
                "Lan",
                ResolvedService { host: "lan.local".into(), port: 80, txt: vec![] },
            )]),
            ..MockLocal::default()
        };
        let browser = SpaceBrowser::new(
            resolver,
            Arc::new(MemoryHealthStore::new()),
            Arc::new(local),
        );

        let found = browser.all(&RequestOptions::inherit(), |_| {}).await.unwrap();

        let urls: Vec<&str> = found.iter().map(SpaceApi::apiurl).collect();
        assert_eq!(urls, vec!["http://good.org/", "https://lan.local:80/"]);
    }

    #[test]
    fn endpoint_rejects_hostless_urls() {
        let resolver = Arc::new(Resolver::new(
            Arc::new(MockTransport::new()),
            Arc::new(MockNames::absent()),
            ClientConfig::default(),
        ));
        let browser = SpaceBrowser::new(
            resolver,
            Arc::new(MemoryHealthStore::new()),
            Arc::new(MockLocal::default()),
        );
        assert_eq!(
            browser.endpoint("http:///x").unwrap_err().kind(),
            ApiErrorKind::Url
        );
    }
}
