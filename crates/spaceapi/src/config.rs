//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TransportOptions;

/// Directory listing used when none is configured: every active hackerspace
/// on hackerspaces.org together with its website, as JSON.
pub const DEFAULT_DIRECTORY_URL: &str = "http://hackerspaces.org/wiki/Special:Ask/-5B-5BCategory:Hackerspace-5D-5D-5B-5Bhackerspace-20status::active-5D-5D/-3FWebsite/mainlabel%3Dhackerspace/order%3DDESC/sort%3D/limit%3D500/format%3Djson";

/// DNS name queried for the default SpaceAPI service.
pub const DEFAULT_SERVICE_NAME: &str = "default._spaceapis._tcp";

/// Service types browsed during local discovery.
pub const LOCAL_SERVICE_TYPES: [&str; 2] = ["_spaceapis._tcp", "_spaceapi._tcp"];

/// Configuration shared by the resolver, directory client and discovery aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Verify TLS certificates unless a call overrides it.
    pub verify_tls: bool,
    /// Per-request timeout unless a call overrides it. `None` means the
    /// transport's own default.
    #[serde(with = "opt_secs")]
    pub timeout: Option<Duration>,
    /// Directory listing source.
    pub directory_url: String,
    /// Whether directory scans consult and persist the health cache.
    pub cache_enabled: bool,
    /// Age after which a health cache entry is discarded.
    #[serde(with = "secs")]
    pub cache_ttl: Duration,
    /// Upper bound on a whole local discovery run.
    #[serde(with = "secs")]
    pub discovery_timeout: Duration,
    /// DNS name of the default service.
    pub default_service_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: None,
            directory_url: DEFAULT_DIRECTORY_URL.to_owned(),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            discovery_timeout: Duration::from_secs(10),
            default_service_name: DEFAULT_SERVICE_NAME.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Applies per-call overrides on top of these defaults.
    pub fn transport_options(&self, overrides: &RequestOptions) -> TransportOptions {
        TransportOptions {
            verify_tls: overrides.verify_tls.unwrap_or(self.verify_tls),
            timeout: overrides.timeout.or(self.timeout),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set whether TLS certificates are verified by default.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.config.verify_tls = verify;
        self
    }

    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the directory listing URL.
    pub fn directory_url(mut self, url: impl Into<String>) -> Self {
        self.config.directory_url = url.into();
        self
    }

    /// Enable or disable the directory health cache.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    /// Set the health cache entry lifetime.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the overall local discovery timeout.
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.discovery_timeout = timeout;
        self
    }

    /// Set the DNS name of the default service.
    pub fn default_service_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_service_name = name.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Per-call overrides. Unset fields fall back to [`ClientConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Override for TLS verification.
    pub verify_tls: Option<bool>,
    /// Override for the request timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options that override nothing.
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Override TLS verification.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    /// Override the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fields set in `self` win; the rest come from `fallback`.
    pub fn or(self, fallback: RequestOptions) -> Self {
        Self {
            verify_tls: self.verify_tls.or(fallback.verify_tls),
            timeout: self.timeout.or(fallback.timeout),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
