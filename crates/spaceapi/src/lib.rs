//! SpaceAPI discovery and resolution domain.
//!
//! Given a loosely specified identifier (a URL, a directory listing, or
//! nothing at all) this crate locates working SpaceAPI endpoints and fetches
//! their status documents through a chain of fallback strategies, caching
//! endpoint health so known-dead candidates are not probed repeatedly.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no I/O of its
//! own. HTTP, DNS, local service discovery and cache storage are reached
//! through the traits in [`ports`]; the `http-transport`, `dns`, `mdns` and
//! `store` crates implement them, and the CLI wires everything together.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`resolver`] | The fallback chain: direct → HTML link → `/status.json` → DNS |
//! | [`api`] | [`SpaceApi`], the lazily loaded per-endpoint view |
//! | [`directory`] | Directory listing scan with progress reporting |
//! | [`health`] | TTL'd health cache and an in-memory store |
//! | [`discovery`] | Local-network browse tree plus the DNS default endpoint |
//! | [`browser`] | [`SpaceBrowser`], directory + discovery in one object |
//! | [`ports`] | Adapter traits and their error types |
//! | [`config`] | [`ClientConfig`] and per-call [`RequestOptions`] |
//! | [`identifiers`] | [`SpaceUrl`], [`ScanId`] and discovery names |
//! | [`types`] | Shared values ([`SpaceDocument`], [`HttpResponse`], [`Timestamp`], ...) |
//! | [`errors`] | [`ApiError`] taxonomy and [`AccessError`] |
//! | [`html`] | `<link rel="space-api">` extraction |

pub mod api;
pub mod browser;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod errors;
pub mod health;
pub mod html;
pub mod identifiers;
pub mod ports;
pub mod resolver;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use api::SpaceApi;
pub use browser::SpaceBrowser;
pub use config::{
    ClientConfig, ClientConfigBuilder, RequestOptions, DEFAULT_DIRECTORY_URL,
    DEFAULT_SERVICE_NAME, LOCAL_SERVICE_TYPES,
};
pub use directory::{DirectoryClient, Progress};
pub use discovery::DiscoveryAggregator;
pub use errors::{AccessError, ApiError, ApiErrorKind, MissingField};
pub use health::{HealthCache, HealthEntry, MemoryHealthStore, ProbeDecision};
pub use identifiers::{BrowseDomain, ScanId, ServiceType, SpaceUrl};
pub use ports::{
    DnsError, HealthStore, LocalDiscovery, LocalDiscoveryError, NameResolver, StoreError,
    Transport, TransportError, TransportOptions,
};
pub use resolver::Resolver;
pub use types::{
    txt_path, HttpResponse, ResolvedService, ServiceInstance, SpaceDocument, SrvRecord, Timestamp,
};
