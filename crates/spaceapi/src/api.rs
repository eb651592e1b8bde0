//! Lazily loaded, memoizing view over one SpaceAPI endpoint.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{AccessError, ApiError, RequestOptions, Resolver, SpaceDocument, SpaceUrl};

/// A single SpaceAPI endpoint.
///
/// The document is fetched on first access and reused until [`SpaceApi::load`]
/// is called again. The cache lock is held across the fetch, so concurrent
/// first accesses still resolve only once.
pub struct SpaceApi {
    url: SpaceUrl,
    resolver: Arc<Resolver>,
    options: RequestOptions,
    cache: Mutex<Option<Arc<SpaceDocument>>>,
}

impl SpaceApi {
    /// Wraps an already-validated URL.
    pub fn new(url: SpaceUrl, resolver: Arc<Resolver>) -> Self {
        Self {
            url,
            resolver,
            options: RequestOptions::inherit(),
            cache: Mutex::new(None),
        }
    }

    /// Parses `input` and wraps it.
    ///
    /// # Errors
    ///
    /// [`ApiError::Url`] if `input` has no host or is not an http(s) URL.
    pub fn parse(input: &str, resolver: Arc<Resolver>) -> Result<Self, ApiError> {
        Ok(Self::new(SpaceUrl::parse(input)?, resolver))
    }

    /// Sets the options this endpoint resolves with when a call passes none.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &SpaceUrl {
        &self.url
    }

    /// The endpoint URL as a string. Never triggers a load.
    pub fn apiurl(&self) -> &str {
        self.url.as_str()
    }

    /// Resolves the endpoint, replacing any cached document.
    pub async fn load(&self) -> Result<Arc<SpaceDocument>, ApiError> {
        self.load_with(RequestOptions::inherit()).await
    }

    /// Like [`SpaceApi::load`], with per-call overrides.
    pub async fn load_with(&self, options: RequestOptions) -> Result<Arc<SpaceDocument>, ApiError> {
        let mut cache = self.cache.lock().await;
        let doc = Arc::new(
            self.resolver
                .resolve(&self.url, &options.or(self.options))
                .await?,
        );
        *cache = Some(Arc::clone(&doc));
        Ok(doc)
    }

    /// Returns the cached document, loading it first if necessary.
    pub async fn document(&self) -> Result<Arc<SpaceDocument>, ApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(doc) = cache.as_ref() {
            return Ok(Arc::clone(doc));
        }
        let doc = Arc::new(self.resolver.resolve(&self.url, &self.options).await?);
        *cache = Some(Arc::clone(&doc));
        Ok(doc)
    }

    /// Whether a document is cached.
    pub async fn is_loaded(&self) -> bool {
        self.cache.lock().await.is_some()
    }

    /// The space name (`space`).
    pub async fn name(&self) -> Result<String, AccessError> {
        self.field("space").await
    }

    /// The postal address (`address`).
    pub async fn address(&self) -> Result<String, AccessError> {
        self.field("address").await
    }

    /// The logo URL (`logo`).
    pub async fn logo(&self) -> Result<String, AccessError> {
        self.field("logo").await
    }

    /// The SpaceAPI version marker (`api`).
    pub async fn api_version(&self) -> Result<String, AccessError> {
        self.field("api").await
    }

    async fn field(&self, key: &str) -> Result<String, AccessError> {
        let doc = self.document().await?;
        Ok(doc.get_str(key)?.to_owned())
    }
}

impl std::fmt::Debug for SpaceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceApi").field("url", &self.url.as_str()).finish()
    }
}

impl std::fmt::Display for SpaceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpaceApi('{}')", self.url)
    }
}
