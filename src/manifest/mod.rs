//! Book manifest retrieval and page descriptor construction.
//!
//! The archive publishes each book as a IIIF manifest wrapped in a JSON
//! envelope. [`ManifestFetcher`] issues the single manifest request and turns
//! the response into a [`Manifest`]: the ordered list of page image ids.
//! [`Manifest::page_descriptors`] then pairs every id with its download URL
//! and destination file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use nli_downloader_core::download::HttpClient;
//! use nli_downloader_core::manifest::{
//!     DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_MANIFEST_BASE_URL, ManifestFetcher, manifest_url,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = ManifestFetcher::new(&HttpClient::new());
//! let url = manifest_url(DEFAULT_MANIFEST_BASE_URL, "PNX_MANUSCRIPTS990000621610205171-1");
//! let manifest = fetcher.fetch(&url).await?;
//! let pages = manifest.page_descriptors(DEFAULT_DOWNLOAD_BASE_URL, Path::new("./book"));
//! println!("{} pages", pages.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod model;

use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, instrument, warn};

pub use error::{ManifestError, ManifestFailure};
use model::{Envelope, IiifManifest};

use crate::download::HttpClient;

/// Manifest endpoint; the book id is appended.
pub const DEFAULT_MANIFEST_BASE_URL: &str = "https://web.nli.org.il/_layouts/15/NLI.DigitalItemPresentor/Mirador/web.nli.org.il/sites/NLIS/he/_vti_bin/NLI.DigitalItemPresentor/IIIFManifest.svc/GetManifestByDocID/";

/// Image delivery endpoint; the image id is appended.
pub const DEFAULT_DOWNLOAD_BASE_URL: &str =
    "http://rosetta.nli.org.il/delivery/DeliveryManagerServlet?dps_func=stream&dps_pid=";

/// Extension given to every page file.
const PAGE_EXTENSION: &str = "tiff";

/// Builds the manifest URL for `book_id`, percent-encoding the id.
#[must_use]
pub fn manifest_url(base: &str, book_id: &str) -> String {
    format!("{base}{}", urlencoding::encode(book_id))
}

/// One page of a book, ready to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// 0-based position in the book.
    pub index: usize,
    /// Remote image identifier from the manifest.
    pub image_id: String,
    /// Download base URL followed by the image id.
    pub source_url: String,
    /// `<folder>/<index>.tiff`.
    pub destination: PathBuf,
}

impl PageDescriptor {
    /// Creates the descriptor for page `index`.
    #[must_use]
    pub fn new(
        index: usize,
        image_id: impl Into<String>,
        download_base: &str,
        folder: &Path,
    ) -> Self {
        let image_id = image_id.into();
        Self {
            index,
            source_url: format!("{download_base}{image_id}"),
            destination: folder.join(format!("{index}.{PAGE_EXTENSION}")),
            image_id,
        }
    }
}

/// Ordered page image ids of one book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    image_ids: Vec<String>,
}

impl Manifest {
    /// Decodes a manifest response body.
    ///
    /// `url` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::RemoteReported`] when the envelope reports
    /// failure, and [`ManifestError::Malformed`] when the body or the nested
    /// IIIF document does not have the expected shape.
    pub fn parse(url: &str, body: &str) -> Result<Self, ManifestError> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| ManifestError::malformed(url, format!("invalid envelope: {e}")))?;

        if !envelope.success {
            let message = envelope
                .error_message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "no error message provided".to_string());
            return Err(ManifestError::remote_reported(message));
        }

        let document: IiifManifest = match envelope.value {
            Some(serde_json::Value::String(encoded)) => serde_json::from_str(&encoded),
            Some(value @ serde_json::Value::Object(_)) => serde_json::from_value(value),
            Some(serde_json::Value::Null) | None => {
                return Err(ManifestError::malformed(url, "envelope has no Value"));
            }
            Some(other) => {
                return Err(ManifestError::malformed(
                    url,
                    format!("Value has unexpected type: {other}"),
                ));
            }
        }
        .map_err(|e| ManifestError::malformed(url, format!("invalid IIIF manifest: {e}")))?;

        Self::from_iiif(url, document)
    }

    fn from_iiif(url: &str, document: IiifManifest) -> Result<Self, ManifestError> {
        let Some(sequence) = document.sequences.into_iter().next() else {
            return Err(ManifestError::malformed(url, "manifest has no sequences"));
        };

        let image_ids = sequence
            .canvases
            .into_iter()
            .enumerate()
            .map(|(index, canvas)| {
                canvas
                    .images
                    .into_iter()
                    .next()
                    .map(|image| image.id)
                    .ok_or_else(|| {
                        ManifestError::malformed(url, format!("canvas {index} has no images"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { image_ids })
    }

    /// Returns the page image ids in book order.
    #[must_use]
    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    /// Returns the number of pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    /// Returns true for a book without pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }

    /// Builds one [`PageDescriptor`] per page, indexed by position.
    #[must_use]
    pub fn page_descriptors(&self, download_base: &str, folder: &Path) -> Vec<PageDescriptor> {
        self.image_ids
            .iter()
            .enumerate()
            .map(|(index, id)| PageDescriptor::new(index, id.as_str(), download_base, folder))
            .collect()
    }
}

/// Fetches and decodes book manifests.
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: Client,
}

impl ManifestFetcher {
    /// Creates a fetcher sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: &HttpClient) -> Self {
        Self {
            client: client.inner().clone(),
        }
    }

    /// Issues one GET to `url` and decodes the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on transport failure, a non-success status,
    /// a failure reported by the archive or an unexpected payload shape.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<Manifest, ManifestError> {
        debug!("requesting manifest");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ManifestError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "manifest request rejected");
            return Err(ManifestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ManifestError::from_reqwest(url, e))?;

        let manifest = Manifest::parse(url, &body)?;
        debug!(pages = manifest.len(), "manifest decoded");
        Ok(manifest)
    }
}
