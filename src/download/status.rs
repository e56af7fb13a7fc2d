//! Shared counters for a book download run.
//!
//! [`GlobalStatus`] is written by every page task and read by the progress
//! reporter. Each counter is an independent atomic, so a reader never sees a
//! half-written value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Run-wide counters shared between page tasks and the progress reporter.
#[derive(Debug, Default)]
pub struct GlobalStatus {
    total: AtomicUsize,
    active: AtomicUsize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

/// Point-in-time copy of [`GlobalStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Pages in the book.
    pub total: usize,
    /// Pages currently holding an admission slot.
    pub active: usize,
    /// Pages downloaded successfully.
    pub finished: usize,
    /// Pages that exhausted every attempt.
    pub failed: usize,
    /// Pages stopped by cancellation.
    pub cancelled: usize,
    /// Bytes received across all attempts, including failed ones.
    pub bytes_downloaded: u64,
}

impl StatusSnapshot {
    /// Pages that reached a terminal state.
    #[must_use]
    pub fn terminal(&self) -> usize {
        self.finished + self.failed + self.cancelled
    }
}

impl GlobalStatus {
    /// Creates a status with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the number of pages in the book.
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Returns the number of pages in the book.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Returns the number of pages currently downloading.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns the number of successfully downloaded pages.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Returns the number of pages that exhausted their attempts.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of cancelled pages.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cumulative number of bytes received.
    #[must_use]
    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::SeqCst)
    }

    /// Adds received bytes. Called once per streamed chunk.
    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn increment_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks one page as active until the returned guard is dropped.
    #[must_use = "the page stops counting as active when the guard is dropped"]
    pub fn enter_active(self: &Arc<Self>) -> ActiveGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            status: Arc::clone(self),
        }
    }

    /// Takes a copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            total: self.total(),
            active: self.active(),
            finished: self.finished(),
            failed: self.failed(),
            cancelled: self.cancelled(),
            bytes_downloaded: self.bytes_downloaded(),
        }
    }
}

/// Keeps one page counted as active; decrements on drop.
#[derive(Debug)]
pub struct ActiveGuard {
    status: Arc<GlobalStatus>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.status.active.fetch_sub(1, Ordering::SeqCst);
    }
}
