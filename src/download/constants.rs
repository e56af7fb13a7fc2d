//! Constants for the download module (timeouts, ceiling, retry budget).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large page scans).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum number of pages downloading at the same time.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Attempts per page, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How often the progress line is redrawn.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
