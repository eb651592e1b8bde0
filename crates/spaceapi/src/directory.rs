//! Directory scanning.
//!
//! Fetches a curated listing of hackerspace websites, probes each one through
//! the [`Resolver`], and returns the endpoints that answered. With the health
//! cache enabled, candidates that failed within the TTL are skipped and the
//! cache is persisted after every probe, so an interrupted scan loses at most
//! the probe in flight.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn, Span};

use crate::{
    ApiError, HealthCache, HealthStore, ProbeDecision, RequestOptions, Resolver, ScanId, SpaceApi,
    Timestamp,
};

/// One probe outcome, reported as the scan progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Zero-based position of the candidate in the listing.
    pub index: usize,
    /// Number of entries in the listing, with or without a website.
    pub total: usize,
    /// Endpoint URL that was probed.
    pub url: String,
    /// Whether the probe produced a document.
    pub success: bool,
}

/// Scans a directory listing for working SpaceAPI endpoints.
pub struct DirectoryClient {
    resolver: Arc<Resolver>,
    store: Arc<dyn HealthStore>,
}

impl DirectoryClient {
    /// Creates a client that persists health through `store`.
    pub fn new(resolver: Arc<Resolver>, store: Arc<dyn HealthStore>) -> Self {
        Self { resolver, store }
    }

    /// Probes every listed website and returns the ones that resolved, in
    /// listing order.
    ///
    /// Individual probe failures are recorded and reported through `progress`,
    /// never returned.
    ///
    /// # Errors
    ///
    /// Only failures fetching the listing itself: [`ApiError::Connect`] if it
    /// cannot be reached, [`ApiError::Parse`] if it is not a JSON listing.
    #[instrument(skip_all, fields(scan_id = %ScanId::new_random(), found = tracing::field::Empty))]
    pub async fn list_candidates<F>(
        &self,
        options: &RequestOptions,
        mut progress: F,
    ) -> Result<Vec<SpaceApi>, ApiError>
    where
        F: FnMut(&Progress) + Send,
    {
        let config = self.resolver.config();
        let listing = self.fetch_listing(options).await?;
        let total = listing.len();

        let caching = config.cache_enabled;
        let mut cache = if caching {
            self.store.load().await
        } else {
            HealthCache::new()
        };
        if caching && cache.is_empty() {
            info!(total, "Starting with a blank health cache; this could take a while");
        }

        let mut found = Vec::new();
        for (index, entry) in listing.iter().enumerate() {
            let Some(website) = website_of(entry) else {
                continue;
            };

            let api = match SpaceApi::parse(website, Arc::clone(&self.resolver)) {
                Ok(api) => api.with_options(*options),
                Err(err) => {
                    debug!(website, error = %err, "Skipping unusable candidate");
                    continue;
                }
            };

            if caching
                && cache.evaluate(website, Timestamp::now(), config.cache_ttl)
                    == ProbeDecision::Skip
            {
                debug!(website, "Skipping candidate that failed recently");
                continue;
            }

            let success = match api.load().await {
                Ok(_) => true,
                Err(err) => {
                    debug!(url = api.apiurl(), error = %err, "Probe failed");
                    if caching {
                        cache.mark_invalid(website);
                    }
                    false
                }
            };

            progress(&Progress {
                index,
                total,
                url: api.apiurl().to_owned(),
                success,
            });
            if success {
                found.push(api);
            }

            if caching {
                if let Err(err) = self.store.save(&cache).await {
                    warn!(error = %err, "Could not persist health cache");
                }
            }
        }

        Span::current().record("found", found.len());
        info!(found = found.len(), total, "Directory scan complete");
        Ok(found)
    }

    /// Fetches and flattens the directory listing.
    ///
    /// Accepts `{"items": [...]}`, a bare array, or an object of objects.
    async fn fetch_listing(&self, options: &RequestOptions) -> Result<Vec<Value>, ApiError> {
        let config = self.resolver.config();
        let opts = config.transport_options(options);
        let response = self.resolver.fetch(&config.directory_url, &opts).await?;

        let parse_error = || ApiError::Parse {
            url: config.directory_url.clone(),
        };
        let listing = response.json.ok_or_else(parse_error)?;
        let entries = listing_entries(listing).ok_or_else(parse_error)?;
        debug!(entries = entries.len(), "Fetched directory listing");
        Ok(entries)
    }
}

fn listing_entries(listing: Value) -> Option<Vec<Value>> {
    match listing {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                map.insert("items".to_owned(), other);
                Some(map.into_iter().map(|(_, v)| v).collect())
            }
            None => Some(map.into_iter().map(|(_, v)| v).collect()),
        },
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// The entry's `website`, taking the first element if it is a list.
fn website_of(entry: &Value) -> Option<&str> {
    match entry.get("website")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(values) => values.first()?.as_str(),
        _ => None,
    }
}
