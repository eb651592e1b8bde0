//! SpaceAPI DNS adapter.
//!
//! Implements [`spaceapi::NameResolver`] over [`hickory_resolver`]. Only the
//! two record types the default-service lookup needs are queried: SRV for the
//! target host and port, TXT for the `path=` metadata.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Resolver configuration and error classification stay
//! here; the domain crate sees only [`spaceapi::SrvRecord`] and strings.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, Resolver};
use spaceapi::{DnsError, NameResolver, SrvRecord};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Tokio-backed hickory resolver.
type TokioResolver = Resolver<TokioConnectionProvider>;

/// Errors building the resolver.
#[derive(Debug, Error)]
pub enum DnsSetupError {
    /// The system resolver configuration could not be read.
    #[error("Could not read system DNS configuration: {0}")]
    SystemConfig(#[from] ResolveError),
}

/// [`NameResolver`] implementation over hickory.
pub struct HickoryNameResolver {
    resolver: TokioResolver,
}

impl HickoryNameResolver {
    /// Creates a resolver from the host's DNS configuration (`/etc/resolv.conf`
    /// or the platform equivalent).
    pub fn from_system() -> Result<Self, DnsSetupError> {
        let resolver = Resolver::builder_tokio()?.build();
        Ok(Self { resolver })
    }

    /// Like [`from_system`](Self::from_system), but falls back to hickory's
    /// default public upstreams when the system configuration is unusable.
    pub fn from_system_or_default() -> Self {
        Self::from_system().unwrap_or_else(|err| {
            warn!(error = %err, "Using default DNS upstreams");
            Self::with_config(ResolverConfig::default(), ResolverOpts::default())
        })
    }

    /// Creates a resolver with explicit upstreams and options.
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();
        Self { resolver }
    }
}

#[async_trait]
impl NameResolver for HickoryNameResolver {
    #[instrument(skip(self))]
    async fn query_srv(&self, name: &str) -> Result<SrvRecord, DnsError> {
        let lookup = self
            .resolver
            .srv_lookup(name)
            .await
            .map_err(|e| classify(name, "SRV", e))?;

        let candidates = lookup
            .iter()
            .map(|srv| (srv.priority(), srv.weight(), srv.target().to_string(), srv.port()));

        let record = select_srv(candidates).ok_or_else(|| DnsError::NotFound {
            name: name.to_owned(),
            record: "SRV",
        })?;
        debug!(host = %record.target, port = record.port, "SRV record selected");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn query_txt(&self, name: &str) -> Result<Vec<Vec<String>>, DnsError> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| classify(name, "TXT", e))?;

        let records: Vec<Vec<String>> = lookup
            .iter()
            .map(|txt| decode_txt(txt.txt_data()))
            .collect();

        if records.is_empty() {
            return Err(DnsError::NotFound {
                name: name.to_owned(),
                record: "TXT",
            });
        }
        debug!(count = records.len(), "TXT records received");
        Ok(records)
    }
}

/// Maps a hickory failure: a name with no such records is `NotFound`,
/// everything else is a transport failure.
fn classify(name: &str, record: &'static str, err: ResolveError) -> DnsError {
    if err.is_nx_domain() || err.is_no_records_found() {
        DnsError::NotFound {
            name: name.to_owned(),
            record,
        }
    } else {
        DnsError::Transport(err.to_string())
    }
}

/// Picks the preferred record: lowest priority, then highest weight.
/// Input tuples are `(priority, weight, target, port)`.
fn select_srv(records: impl IntoIterator<Item = (u16, u16, String, u16)>) -> Option<SrvRecord> {
    records
        .into_iter()
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
        .map(|(_, _, target, port)| SrvRecord { target, port })
}

/// Decodes the character strings of one TXT record. Invalid UTF-8 is replaced.
fn decode_txt<B: AsRef<[u8]>>(strings: &[B]) -> Vec<String> {
    strings
        .iter()
        .map(|s| String::from_utf8_lossy(s.as_ref()).into_owned())
        .collect()
}
