//! NLI Downloader Core Library
//!
//! This library fetches a digitized book from the National Library of Israel
//! archive: it reads the book's IIIF manifest, then downloads every page image
//! to disk with bounded concurrency and a fixed retry budget.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`manifest`] - Manifest fetching and page descriptor construction
//! - [`download`] - Page downloader, retry, dispatcher and progress reporting
//! - [`book`] - Orchestration of a whole book download

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod book;
pub mod download;
pub mod manifest;
mod user_agent;

// Re-export commonly used types
pub use book::{BookDownloader, BookDownloaderOptions, BookError, BookReport, default_output_folder};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DispatchReport, Dispatcher, DownloadError,
    DownloadPhase, DownloadTask, EngineError, GlobalStatus, HttpClient, PageFetcher,
    ProgressReporter, RetryOutcome, RetryPolicy, StatusSnapshot, TaskState, retry_bounded,
};
pub use manifest::{
    DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_MANIFEST_BASE_URL, Manifest, ManifestError,
    ManifestFailure, ManifestFetcher, PageDescriptor, manifest_url,
};
