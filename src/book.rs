//! Whole-book orchestration.
//!
//! [`BookDownloader`] runs the pipeline for one book: prepare the output
//! folder, fetch the manifest, dispatch every page and keep the progress line
//! alive while the dispatcher works.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DispatchReport, Dispatcher, EngineError,
    GlobalStatus, HttpClient, PROGRESS_INTERVAL, PageFetcher, ProgressReporter,
    READ_TIMEOUT_SECS, RetryPolicy,
};
use crate::manifest::{
    DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_MANIFEST_BASE_URL, ManifestError, ManifestFetcher,
    manifest_url,
};

/// Fatal errors for a book download.
#[derive(Debug, Error)]
pub enum BookError {
    /// The output folder could not be created.
    #[error("failed to create output folder {path}")]
    FolderCreation {
        /// Folder that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be fetched or decoded.
    #[error("failed to get book manifest")]
    Manifest(#[from] ManifestError),

    /// The dispatcher stopped with an unexpected error.
    #[error("page dispatch failed")]
    Dispatch(#[from] EngineError),

    /// The run was cancelled before page dispatch started.
    #[error("interrupted before any page was downloaded")]
    Cancelled,
}

/// Settings for a [`BookDownloader`].
#[derive(Debug, Clone)]
pub struct BookDownloaderOptions {
    /// Manifest endpoint; the percent-encoded book id is appended.
    pub manifest_base_url: String,
    /// Image endpoint; each page's image id is appended.
    pub download_base_url: String,
    /// Maximum pages downloading at once.
    pub concurrency: usize,
    /// Attempts per page and delay between them.
    pub retry_policy: RetryPolicy,
    /// How often the progress line is redrawn.
    pub progress_interval: Duration,
    /// Draw the progress line on stdout. When false the bar is hidden.
    pub show_progress: bool,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for BookDownloaderOptions {
    fn default() -> Self {
        Self {
            manifest_base_url: DEFAULT_MANIFEST_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            retry_policy: RetryPolicy::default(),
            progress_interval: PROGRESS_INTERVAL,
            show_progress: true,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Outcome of a book download that ran to the end (or was interrupted).
#[derive(Debug, Clone)]
pub struct BookReport {
    /// Book id as given.
    pub book_id: String,
    /// Folder the pages were written to.
    pub output_folder: PathBuf,
    /// Per-page results.
    pub dispatch: DispatchReport,
    /// Bytes received, including bytes from failed attempts.
    pub bytes_downloaded: u64,
    /// True if the run was cancelled before every page finished.
    pub interrupted: bool,
}

impl BookReport {
    /// Number of pages in the book.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.dispatch.len()
    }

    /// True when every page was downloaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.dispatch.succeeded() == self.dispatch.len()
    }
}

/// Returns the default output folder for `book_id`: `./images_<book_id>`.
#[must_use]
pub fn default_output_folder(book_id: &str) -> PathBuf {
    PathBuf::from(".").join(format!("images_{book_id}"))
}

/// Downloads whole books.
pub struct BookDownloader {
    client: HttpClient,
    manifests: ManifestFetcher,
    dispatcher: Dispatcher,
    options: BookDownloaderOptions,
}

impl std::fmt::Debug for BookDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookDownloader")
            .field("dispatcher", &self.dispatcher)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BookDownloader {
    /// Builds the shared HTTP client, manifest fetcher and dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::Dispatch`] if `options.concurrency` is out of range.
    pub fn new(options: BookDownloaderOptions) -> Result<Self, BookError> {
        let client =
            HttpClient::new_with_timeouts(options.connect_timeout_secs, options.read_timeout_secs);
        let manifests = ManifestFetcher::new(&client);
        let dispatcher = Dispatcher::new(options.concurrency, options.retry_policy.clone())?;

        Ok(Self {
            client,
            manifests,
            dispatcher,
            options,
        })
    }

    /// Returns the options this downloader was built with.
    #[must_use]
    pub fn options(&self) -> &BookDownloaderOptions {
        &self.options
    }

    /// Downloads every page of `book_id` into `folder`.
    ///
    /// Pages that exhaust their attempts are listed in the report; they do
    /// not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`BookError`] when the folder cannot be created (before any
    /// network request), the manifest cannot be fetched, or a page task
    /// panics. Cancelling `cancel` while the manifest is loading returns
    /// [`BookError::Cancelled`]; cancelling later yields an interrupted report.
    #[instrument(skip(self, cancel), fields(folder = %folder.display()))]
    pub async fn download_book(
        &self,
        book_id: &str,
        folder: &Path,
        cancel: CancellationToken,
    ) -> Result<BookReport, BookError> {
        ensure_folder(folder).await?;

        let url = manifest_url(&self.options.manifest_base_url, book_id);
        let manifest = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("cancelled while loading the manifest");
                return Err(BookError::Cancelled);
            }
            manifest = self.manifests.fetch(&url) => manifest?,
        };
        let pages = manifest.page_descriptors(&self.options.download_base_url, folder);
        info!(pages = pages.len(), "manifest loaded");

        let status = Arc::new(GlobalStatus::new());
        status.set_total(pages.len());

        let reporter = ProgressReporter::spawn(
            Arc::clone(&status),
            self.progress_bar(),
            self.options.progress_interval,
        );

        let fetcher: Arc<dyn PageFetcher> = Arc::new(self.client.clone());
        let result = self
            .dispatcher
            .run(pages, fetcher, Arc::clone(&status), cancel)
            .await;

        reporter.stop().await;
        let dispatch = result?;

        Ok(BookReport {
            book_id: book_id.to_string(),
            output_folder: folder.to_path_buf(),
            interrupted: dispatch.cancelled() > 0,
            bytes_downloaded: status.bytes_downloaded(),
            dispatch,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if self.options.show_progress {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout())
        } else {
            ProgressBar::hidden()
        }
    }
}

async fn ensure_folder(folder: &Path) -> Result<(), BookError> {
    if tokio::fs::metadata(folder)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
    {
        return Ok(());
    }

    info!(folder = %folder.display(), "output folder doesn't exist, creating it");
    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|source| BookError::FolderCreation {
            path: folder.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_folder() {
        assert_eq!(
            default_output_folder("PNX_1-1"),
            PathBuf::from("./images_PNX_1-1")
        );
    }

    #[test]
    fn test_default_options() {
        let options = BookDownloaderOptions::default();
        assert_eq!(options.concurrency, 10);
        assert_eq!(options.retry_policy.max_attempts(), 3);
        assert_eq!(options.progress_interval, Duration::from_millis(500));
        assert_eq!(options.manifest_base_url, DEFAULT_MANIFEST_BASE_URL);
    }

    #[test]
    fn test_new_rejects_invalid_concurrency() {
        let options = BookDownloaderOptions {
            concurrency: 0,
            ..BookDownloaderOptions::default()
        };
        let err = BookDownloader::new(options).unwrap_err();
        assert!(matches!(
            err,
            BookError::Dispatch(EngineError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_book_error_chain_names_the_cause_once() {
        let err = BookError::from(ManifestError::remote_reported("x"));
        assert_eq!(err.to_string(), "failed to get book manifest");

        let chain = format!("{:#}", anyhow::Error::new(err));
        let repeats = chain.matches("archive reported an error: x").count();
        assert_eq!(repeats, 1, "{chain}");
    }

    #[test]
    fn test_folder_creation_error_chain_includes_io_cause() {
        let err = BookError::FolderCreation {
            path: PathBuf::from("/blocked/out"),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        };

        let chain = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(
            chain,
            "failed to create output folder /blocked/out: not a directory"
        );
    }

    #[tokio::test]
    async fn test_download_book_cancelled_before_start_skips_network() {
        let dir = TempDir::new().unwrap();

        // Unroutable manifest base: reaching the network would yield a Manifest error instead.
        let downloader = BookDownloader::new(BookDownloaderOptions {
            manifest_base_url: "http://127.0.0.1:9/m/".to_string(),
            show_progress: false,
            ..BookDownloaderOptions::default()
        })
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = downloader
            .download_book("B1", dir.path(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::Cancelled));
    }

    #[tokio::test]
    async fn test_ensure_folder_creates_nested_folder() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("a").join("b");

        ensure_folder(&folder).await.unwrap();
        assert!(folder.is_dir());

        // Existing folder is fine.
        ensure_folder(&folder).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_folder_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = ensure_folder(&blocker.join("sub")).await.unwrap_err();
        assert!(matches!(err, BookError::FolderCreation { .. }));
    }

    #[tokio::test]
    async fn test_download_book_folder_failure_happens_before_network() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        // Unroutable manifest base: reaching the network would yield a Manifest error instead.
        let downloader = BookDownloader::new(BookDownloaderOptions {
            manifest_base_url: "http://127.0.0.1:9/m/".to_string(),
            show_progress: false,
            ..BookDownloaderOptions::default()
        })
        .unwrap();

        let err = downloader
            .download_book("B1", &blocker.join("out"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::FolderCreation { .. }));
    }
}
