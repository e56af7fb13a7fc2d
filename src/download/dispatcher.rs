//! Bounded dispatcher for concurrent page downloads with fixed retry.
//!
//! This module provides the [`Dispatcher`], which starts one task per page,
//! admits at most `concurrency` of them at a time through a semaphore, and
//! runs each admitted page through [`retry_bounded`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use nli_downloader_core::download::{Dispatcher, GlobalStatus, HttpClient, RetryPolicy};
//! use nli_downloader_core::manifest::PageDescriptor;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let page = PageDescriptor::new(0, "IE123", "http://archive.test/?pid=", Path::new("./book"));
//! let pages = vec![page];
//! let dispatcher = Dispatcher::new(10, RetryPolicy::default())?;
//! let status = Arc::new(GlobalStatus::new());
//! let report = dispatcher
//!     .run(pages, Arc::new(HttpClient::new()), status, CancellationToken::new())
//!     .await?;
//! println!("Succeeded: {}, Exhausted: {}", report.succeeded(), report.exhausted().count());
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::PageFetcher;
use super::retry::{RetryOutcome, RetryPolicy, retry_bounded};
use super::status::GlobalStatus;
use crate::manifest::PageDescriptor;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Error type for dispatcher operations.
///
/// Page download failures are never reported here; they are absorbed by
/// the retry loop and show up as [`TaskState::Exhausted`] in the report.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// A page task died with an unexpected error instead of finishing.
    #[error("page task failed unexpectedly: {message}")]
    TaskPanicked {
        /// Panic payload or join error text.
        message: String,
    },
}

impl EngineError {
    fn from_join_error(error: JoinError) -> Self {
        let message = if error.is_panic() {
            panic_message(error.into_panic())
        } else {
            error.to_string()
        };
        Self::TaskPanicked { message }
    }
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Lifecycle of one page download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for an admission slot.
    Pending,
    /// Holding a slot and attempting the download.
    InProgress,
    /// One of the attempts succeeded.
    Succeeded,
    /// Every attempt failed.
    Exhausted,
    /// Stopped by cancellation before reaching another terminal state.
    Cancelled,
}

impl TaskState {
    /// Returns true for states a task never leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Cancelled)
    }
}

/// One page plus its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// The page being downloaded.
    pub page: PageDescriptor,
    /// Attempts started so far.
    pub attempts: u32,
    /// Current state.
    pub state: TaskState,
    /// Bytes written by the successful attempt.
    pub bytes_written: u64,
    /// Error text of the last failed attempt, if any.
    pub last_error: Option<String>,
}

impl DownloadTask {
    /// Creates a pending task for `page`.
    #[must_use]
    pub fn new(page: PageDescriptor) -> Self {
        Self {
            page,
            attempts: 0,
            state: TaskState::Pending,
            bytes_written: 0,
            last_error: None,
        }
    }
}

/// Terminal tasks from a dispatcher run, ordered by page index.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    tasks: Vec<DownloadTask>,
}

impl DispatchReport {
    /// Builds a report from terminal tasks, ordering them by page index.
    #[must_use]
    pub fn from_tasks(mut tasks: Vec<DownloadTask>) -> Self {
        tasks.sort_by_key(|task| task.page.index);
        Self { tasks }
    }

    /// Returns every task, ordered by page index.
    #[must_use]
    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    /// Returns the number of tasks in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when the run had no pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the number of pages downloaded successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(TaskState::Succeeded)
    }

    /// Returns the pages that exhausted every attempt.
    pub fn exhausted(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks
            .iter()
            .filter(|task| task.state == TaskState::Exhausted)
    }

    /// Returns the number of cancelled pages.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(TaskState::Cancelled)
    }

    /// Returns the number of download attempts made across all pages.
    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.tasks.iter().map(|task| u64::from(task.attempts)).sum()
    }

    fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }
}

/// Bounded dispatcher for concurrent page downloads with retry support.
///
/// # Concurrency Model
///
/// - Every page gets its own Tokio task as soon as `run` starts
/// - A task acquires a semaphore permit before its first attempt
/// - The permit is held across all attempts and released on exit (RAII)
/// - [`GlobalStatus`] tracks active pages through a guard dropped before the permit
///
/// # Retry Behavior
///
/// - Every [`DownloadError`](super::DownloadError) is retried, up to the policy's attempts
/// - Exhausted pages are logged with their source URL and reported, never fatal
/// - A panicking task is fatal for the whole run
#[derive(Debug)]
pub struct Dispatcher {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured concurrency limit.
    concurrency: usize,
    /// Retry policy applied to each page.
    retry_policy: RetryPolicy,
}

impl Dispatcher {
    /// Creates a dispatcher with the given ceiling and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use nli_downloader_core::download::{Dispatcher, RetryPolicy};
    ///
    /// let dispatcher = Dispatcher::new(10, RetryPolicy::default()).unwrap();
    /// assert_eq!(dispatcher.concurrency(), 10);
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            retry_delay_ms = retry_policy.delay().as_millis(),
            "creating dispatcher"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads every page and waits until each one is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskPanicked`] if any page task panicked. The
    /// first fatal error cancels every other page, so no new attempt starts
    /// after it; the cancelled pages are drained before returning. Returns
    /// [`EngineError::SemaphoreClosed`] if admission broke down.
    ///
    /// Individual download failures do NOT cause this method to error.
    #[instrument(skip_all, fields(pages = pages.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        pages: Vec<PageDescriptor>,
        fetcher: Arc<dyn PageFetcher>,
        status: Arc<GlobalStatus>,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, EngineError> {
        let total = pages.len();
        let mut handles = JoinSet::new();
        // Cancelled by the caller or by the first fatal task error.
        let abort = cancel.child_token();

        info!("starting page dispatch");

        for page in pages {
            handles.spawn(run_task(
                page,
                Arc::clone(&fetcher),
                Arc::clone(&status),
                Arc::clone(&self.semaphore),
                self.retry_policy.clone(),
                abort.clone(),
            ));
        }

        let mut tasks = Vec::with_capacity(total);
        let mut fatal: Option<EngineError> = None;

        while let Some(joined) = handles.join_next().await {
            match joined {
                Ok(Ok(task)) => tasks.push(task),
                Ok(Err(e)) => {
                    error!(error = %e, "page task could not run");
                    abort.cancel();
                    fatal.get_or_insert(e);
                }
                Err(join_error) => {
                    let e = EngineError::from_join_error(join_error);
                    error!(error = %e, "page task panicked, cancelling remaining pages");
                    abort.cancel();
                    fatal.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let report = DispatchReport::from_tasks(tasks);

        info!(
            succeeded = report.succeeded(),
            exhausted = report.exhausted().count(),
            cancelled = report.cancelled(),
            attempts = report.total_attempts(),
            total,
            "page dispatch complete"
        );

        Ok(report)
    }
}

/// Runs one page from admission to a terminal state.
#[instrument(skip_all, fields(page = page.index))]
async fn run_task(
    page: PageDescriptor,
    fetcher: Arc<dyn PageFetcher>,
    status: Arc<GlobalStatus>,
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> Result<DownloadTask, EngineError> {
    let mut task = DownloadTask::new(page);

    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("cancelled before admission");
            task.state = TaskState::Cancelled;
            status.increment_cancelled();
            return Ok(task);
        }
        permit = semaphore.acquire_owned() => {
            permit.map_err(|_| EngineError::SemaphoreClosed)?
        }
    };
    let active = status.enter_active();
    task.state = TaskState::InProgress;

    let attempts_started = AtomicU32::new(0);
    let outcome = {
        let url = task.page.source_url.as_str();
        let destination = task.page.destination.as_path();
        let fetcher = fetcher.as_ref();
        let status = status.as_ref();
        let attempts_started = &attempts_started;

        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            outcome = retry_bounded(&policy, move |attempt| {
                attempts_started.store(attempt, Ordering::SeqCst);
                fetcher.fetch_page(url, destination, status)
            }) => Some(outcome),
        }
    };
    task.attempts = attempts_started.load(Ordering::SeqCst);

    match outcome {
        None => {
            debug!(attempts = task.attempts, "cancelled while downloading");
            if task.attempts > 0 {
                let _ = tokio::fs::remove_file(&task.page.destination).await;
            }
            task.state = TaskState::Cancelled;
            status.increment_cancelled();
        }
        Some(RetryOutcome::Succeeded { value, attempts }) => {
            debug!(attempts, bytes = value, "page downloaded");
            task.bytes_written = value;
            task.state = TaskState::Succeeded;
            status.increment_finished();
        }
        Some(RetryOutcome::Exhausted {
            last_error,
            attempts,
        }) => {
            warn!(
                url = %task.page.source_url,
                attempts,
                error = %last_error,
                "failed to download page; it can be downloaded manually from its source URL"
            );
            task.last_error = Some(last_error.to_string());
            task.state = TaskState::Exhausted;
            status.increment_failed();
        }
    }

    // Active must drop before the slot is released so it never exceeds the ceiling.
    drop(active);
    drop(permit);
    Ok(task)
}
