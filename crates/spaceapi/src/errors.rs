//! Error taxonomy for SpaceAPI resolution.
//!
//! [`ApiError`] is the single error type every resolution path produces. Its
//! variants are the four failure kinds a caller may want to tell apart; use
//! [`ApiError::kind`] to match narrowly, or handle the enum as a whole to
//! catch broadly.
//!
//! [`AccessError`] is what the [`crate::SpaceApi`] accessors return: either
//! the resolution itself failed, or the resolved document lacks the requested
//! field. A missing `logo` is never reported as an unreachable endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// No usable response at all (connection refused, timeout, DNS transport failure).
    Connect,
    /// Responses were received but no stage produced a JSON document.
    Parse,
    /// A DNS or local discovery record was absent.
    Discovery,
    /// A candidate URL was malformed or had no host.
    Url,
}

/// Errors produced while constructing, locating, or fetching a SpaceAPI endpoint.
///
/// `Connect` and `Discovery` stop a resolution immediately; only the
/// condition that ends up as `Parse` falls through from one stage to the next.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// A transport-level failure or timeout while talking to `url`.
    #[error("Could not connect to {url}: {message}")]
    Connect {
        /// The URL (or DNS name) being contacted when the failure occurred.
        url: String,
        /// Human-readable description from the transport.
        message: String,
    },

    /// Every stage of the fallback chain completed without finding a JSON document.
    #[error("No SpaceAPI document found for {url}")]
    Parse {
        /// The base URL that was being resolved.
        url: String,
    },

    /// A required discovery record does not exist.
    #[error("Discovery of '{name}' failed: {reason}")]
    Discovery {
        /// Service or record name that was looked up.
        name: String,
        /// What was missing.
        reason: String,
    },

    /// A candidate URL could not be used as an endpoint.
    #[error("Invalid endpoint URL '{input}': {reason}")]
    Url {
        /// The rejected input, verbatim.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ApiError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Connect { .. } => ApiErrorKind::Connect,
            Self::Parse { .. } => ApiErrorKind::Parse,
            Self::Discovery { .. } => ApiErrorKind::Discovery,
            Self::Url { .. } => ApiErrorKind::Url,
        }
    }

    pub(crate) fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    pub(crate) fn discovery(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Discovery {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Url {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document access errors
// ---------------------------------------------------------------------------

/// A resolved document does not contain the requested key (or it is not a string).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("SpaceAPI document has no field '{key}'")]
pub struct MissingField {
    /// The key that was requested.
    pub key: String,
}

/// Errors returned by the data accessors on [`crate::SpaceApi`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Loading the document failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The document was loaded but lacks the requested field.
    #[error("SpaceAPI document has no field '{key}'")]
    MissingField {
        /// The key that was requested.
        key: String,
    },
}

impl From<MissingField> for AccessError {
    fn from(err: MissingField) -> Self {
        Self::MissingField { key: err.key }
    }
}
