//! Newtype identifiers.
//!
//! [`SpaceUrl`] is the identity of an endpoint: every [`crate::SpaceApi`] is
//! built around one, and constructing it is where malformed candidates are
//! rejected. The remaining types name things that flow through discovery and
//! tracing so they cannot be confused with arbitrary strings.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::ApiError;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Endpoint URL
// ---------------------------------------------------------------------------

/// Schemes an endpoint may use.
const ACCEPTED_SCHEMES: [&str; 2] = ["http", "https"];

/// A normalized SpaceAPI base URL with a guaranteed non-empty host.
///
/// `url::Url` silently repairs inputs such as `http:///space.org`, treating
/// the first path segment as the host. That input has no network location,
/// so [`SpaceUrl::parse`] inspects the raw authority as well as the parsed
/// result and rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpaceUrl(Url);

impl SpaceUrl {
    /// Parses and validates a candidate endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Url`] if the input does not parse, uses a scheme
    /// other than `http`/`https`, or has an empty network location.
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|e| ApiError::url(input, e.to_string()))?;

        if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
            return Err(ApiError::url(
                input,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if !has_authority(trimmed) || url.host_str().is_none_or(str::is_empty) {
            return Err(ApiError::url(input, "missing host"));
        }

        Ok(Self(url))
    }

    /// Returns the full URL as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying [`Url`].
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the URL scheme (`http` or `https`).
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Returns the host component. Never empty.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Resolves `reference` against this URL, as a browser would for an `href`.
    pub fn join(&self, reference: &str) -> Result<Url, url::ParseError> {
        self.0.join(reference)
    }

    /// `{scheme}://{host}[:port]/status.json` for this endpoint.
    pub fn well_known(&self) -> Url {
        let mut url = self.0.clone();
        url.set_path("/status.json");
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl std::fmt::Display for SpaceUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SpaceUrl {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether `raw` has a non-empty host between `://` and the path.
fn has_authority(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    !host_port.is_empty() && !host_port.starts_with(':')
}

// ---------------------------------------------------------------------------
// Run identifiers
// ---------------------------------------------------------------------------

/// Identifies a single directory scan or discovery run.
///
/// Generated fresh for every run and recorded on its tracing span so all
/// probes from one run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(Uuid);

impl ScanId {
    /// Generates a new random scan identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Discovery names
// ---------------------------------------------------------------------------

string_id! {
    /// A DNS-SD service type such as `_spaceapi._tcp`.
    ServiceType
}

string_id! {
    /// A service discovery browse domain such as `local`.
    BrowseDomain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiErrorKind;

    #[test]
    fn parses_plain_http_and_https() {
        let url = SpaceUrl::parse("https://example.org/spaceapi.json").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host(), "example.org");
        assert_eq!(url.as_str(), "https://example.org/spaceapi.json");

        let url = SpaceUrl::parse("http://Example.ORG").unwrap();
        assert_eq!(url.as_str(), "http://example.org/");
    }

    #[test]
    fn rejects_urls_without_network_location() {
        for input in [
            "http:///status.json",
            "https:///",
            "http://",
            "https://:8080/x",
            "example.org",
            "/relative/path",
            "",
        ] {
            let err = SpaceUrl::parse(input).unwrap_err();
            assert_eq!(err.kind(), ApiErrorKind::Url, "input {input:?}");
        }
    }

    #[test]
    fn rejects_other_schemes() {
        for input in ["mailto:info@example.org", "ftp://example.org/", "file:///etc"] {
            let err = SpaceUrl::parse(input).unwrap_err();
            assert_eq!(err.kind(), ApiErrorKind::Url, "input {input:?}");
        }
    }

    #[test]
    fn well_known_keeps_port_and_drops_path() {
        let url = SpaceUrl::parse("https://example.org:8443/foo/bar?x=1").unwrap();
        assert_eq!(
            url.well_known().as_str(),
            "https://example.org:8443/status.json"
        );
    }

    #[test]
    fn join_resolves_relative_hrefs_against_host() {
        let url = SpaceUrl::parse("http://example.org/wiki/Main").unwrap();
        assert_eq!(
            url.join("/spaceapi.json").unwrap().as_str(),
            "http://example.org/spaceapi.json"
        );
        assert_eq!(
            url.join("https://api.example.net/s.json").unwrap().as_str(),
            "https://api.example.net/s.json"
        );
    }

    #[test]
    fn string_ids_reject_empty() {
        assert!(ServiceType::new("").is_none());
        assert_eq!(ServiceType::new("_spaceapi._tcp").unwrap().as_str(), "_spaceapi._tcp");
    }
}
