//! Error types for manifest retrieval.

use thiserror::Error;

/// Coarse category of a [`ManifestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFailure {
    /// The archive answered but reported a failure in its envelope.
    RemoteReported,
    /// The response could not be decoded into the expected shape.
    Malformed,
    /// The request never produced a usable response.
    Network,
}

/// Errors that can occur while fetching a book manifest.
///
/// Every variant is fatal for the run: without a manifest no page is known.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The envelope came back with `Success: false`.
    #[error("archive reported an error: {message}")]
    RemoteReported {
        /// Server-provided error message.
        message: String,
    },

    /// Body was not JSON, or did not have the expected nested shape.
    #[error("malformed manifest from {url}: {detail}")]
    Malformed {
        /// Manifest URL.
        url: String,
        /// What was wrong with it.
        detail: String,
    },

    /// Transport-level failure (DNS, connection refused, body read error).
    #[error("network error fetching manifest {url}")]
    Network {
        /// Manifest URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out.
    #[error("timeout fetching manifest {url}")]
    Timeout {
        /// Manifest URL.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching manifest {url}")]
    HttpStatus {
        /// Manifest URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl ManifestError {
    /// Creates a remote-reported error.
    pub fn remote_reported(message: impl Into<String>) -> Self {
        Self::RemoteReported {
            message: message.into(),
        }
    }

    /// Creates a malformed-payload error.
    pub fn malformed(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn reason(&self) -> ManifestFailure {
        match self {
            Self::RemoteReported { .. } => ManifestFailure::RemoteReported,
            Self::Malformed { .. } => ManifestFailure::Malformed,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ManifestFailure::Network
            }
        }
    }
}
