//! Shared value types.
//!
//! These are the values that cross the port boundary ([`HttpResponse`],
//! [`SrvRecord`], [`ServiceInstance`], [`ResolvedService`]) plus the resolved
//! [`SpaceDocument`] itself and the wall-clock [`Timestamp`] used by the
//! directory health cache.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BrowseDomain, MissingField, ServiceType};

// ---------------------------------------------------------------------------
// Resolved document
// ---------------------------------------------------------------------------

/// A resolved SpaceAPI JSON document.
///
/// Treated as an open mapping: no schema validation is performed, and the
/// accessors report absent keys instead of substituting defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceDocument(Map<String, Value>);

impl SpaceDocument {
    /// Wraps a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Result<&Value, MissingField> {
        self.0.get(key).ok_or_else(|| MissingField { key: key.to_owned() })
    }

    /// Returns the string stored under `key`.
    ///
    /// A present but non-string value is reported as missing.
    pub fn get_str(&self, key: &str) -> Result<&str, MissingField> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| MissingField { key: key.to_owned() })
    }
}

// ---------------------------------------------------------------------------
// Transport values
// ---------------------------------------------------------------------------

/// A completed HTTP response as seen by the resolver.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code. Not inspected by the resolver.
    pub status: u16,
    /// Response headers keyed by lower-cased name.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Bytes,
    /// The body parsed as JSON, or `None` if it is not valid JSON.
    pub json: Option<Value>,
}

impl HttpResponse {
    /// Builds a response, lower-casing header names and parsing the body as
    /// JSON on a best-effort basis.
    pub fn new(
        status: u16,
        headers: impl IntoIterator<Item = (String, String)>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let json = serde_json::from_slice(&body).ok();
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body,
            json,
        }
    }

    /// Returns the `content-type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Returns `true` if the response declares an HTML body.
    pub fn is_html(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// Returns the body as a SpaceAPI document if it parsed to a JSON object.
    pub fn document(&self) -> Option<SpaceDocument> {
        self.json.clone().and_then(SpaceDocument::from_value)
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The target of a DNS SRV record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvRecord {
    /// Target host name, possibly with a trailing root dot.
    pub target: String,
    /// Target port.
    pub port: u16,
}

impl SrvRecord {
    /// Returns the target host without its trailing root dot.
    pub fn host(&self) -> &str {
        self.target.strip_suffix('.').unwrap_or(&self.target)
    }
}

// ---------------------------------------------------------------------------
// Local discovery values
// ---------------------------------------------------------------------------

/// A service instance announced on the local network but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Instance name (e.g. `"Hackerspace Foo"`).
    pub name: String,
    /// Service type the instance was found under.
    pub service_type: ServiceType,
    /// Browse domain the instance was found in.
    pub domain: BrowseDomain,
}

/// A local service instance resolved to a reachable address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedService {
    /// Host name or address to connect to.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// Raw TXT record strings, typically `key=value`.
    pub txt: Vec<String>,
}

impl ResolvedService {
    /// Builds the endpoint URL `https://{host}:{port}{path}` for this service.
    pub fn endpoint_url(&self) -> String {
        let host = self.host.strip_suffix('.').unwrap_or(&self.host);
        format!(
            "https://{}:{}{}",
            host,
            self.port,
            txt_path(self.txt.iter().map(String::as_str))
        )
    }
}

/// Extracts the `path` value from `key=value` TXT strings.
///
/// Defaults to `/`; the last `path` entry wins, strings without `=` are
/// ignored, and a leading `/` is added when missing.
pub fn txt_path<'a>(strings: impl IntoIterator<Item = &'a str>) -> String {
    let path = strings
        .into_iter()
        .filter_map(|s| s.split_once('='))
        .filter(|(key, _)| *key == "path")
        .map(|(_, value)| value)
        .last()
        .unwrap_or("/");

    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Serialized as fractional seconds since the Unix epoch, matching
/// the on-disk directory cache format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns this timestamp moved back by `secs` seconds.
    pub fn minus_secs(self, secs: i64) -> Self {
        Self(self.0 - ChronoDuration::seconds(secs))
    }

    /// Time elapsed from `self` until `later`, at full precision. Zero if
    /// `later` is earlier.
    pub fn elapsed_until(self, later: Timestamp) -> Duration {
        (later.0 - self.0).to_std().unwrap_or(Duration::ZERO)
    }

    fn as_epoch_secs(self) -> f64 {
        self.0.timestamp_micros() as f64 / 1_000_000.0
    }

    fn from_epoch_secs(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((secs * 1_000_000.0) as i64).map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_epoch_secs())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Self::from_epoch_secs(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}")))
    }
}
