//! Error types for the download module.
//!
//! Every page download failure carries the URL or path it happened on and
//! belongs to one of two phases: the network side or the disk side.

use std::path::PathBuf;

use thiserror::Error;

/// Which side of a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    /// Request, response status or body stream failed.
    Network,
    /// Creating, writing or flushing the destination file failed.
    Disk,
}

/// Errors that can occur while downloading a single page.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset mid-body, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the page (create, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Disk {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a disk error.
    pub fn disk(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Disk {
            path: path.into(),
            source,
        }
    }

    /// Maps a reqwest error into the matching variant.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Returns the transfer side that failed.
    #[must_use]
    pub fn phase(&self) -> DownloadPhase {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                DownloadPhase::Network
            }
            Self::Disk { .. } => DownloadPhase::Disk,
        }
    }
}

// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`:
// every variant needs a URL or path that the source errors don't carry.
