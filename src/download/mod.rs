//! Page download machinery: streaming downloader, retry, dispatcher and progress.
//!
//! This module provides everything needed to turn an ordered list of
//! [`PageDescriptor`](crate::manifest::PageDescriptor)s into files on disk.
//!
//! # Features
//!
//! - Streaming downloads (memory bounded regardless of page size)
//! - Live byte accounting through a shared [`GlobalStatus`]
//! - Bounded concurrency with a semaphore-backed [`Dispatcher`]
//! - Fixed-attempt retry via [`retry_bounded`]
//! - Cancellation of in-flight and pending pages
//! - A periodic single-line [`ProgressReporter`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use nli_downloader_core::download::{GlobalStatus, HttpClient, PageFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let status = Arc::new(GlobalStatus::new());
//! let bytes = client
//!     .fetch_page("http://example.com/page", Path::new("./images/0.tiff"), &status)
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod dispatcher;
mod error;
mod progress;
mod retry;
mod status;

pub use client::{HttpClient, PageFetcher};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, PROGRESS_INTERVAL,
    READ_TIMEOUT_SECS,
};
pub use dispatcher::{DispatchReport, Dispatcher, DownloadTask, EngineError, TaskState};
pub use error::{DownloadError, DownloadPhase};
pub use progress::{ProgressReporter, render_status_line};
pub use retry::{RetryOutcome, RetryPolicy, retry_bounded};
pub use status::{ActiveGuard, GlobalStatus, StatusSnapshot};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
