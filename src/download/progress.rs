//! Single-line progress display for a running book download.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::status::{GlobalStatus, StatusSnapshot};

/// Formats the status line shown while pages download.
#[must_use]
pub fn render_status_line(snapshot: &StatusSnapshot) -> String {
    format!(
        "{} pages, {} pages downloaded. Downloaded {} until now",
        snapshot.total,
        snapshot.finished,
        HumanBytes(snapshot.bytes_downloaded)
    )
}

/// Background task that redraws the status line at a fixed interval.
///
/// The reporter only reads [`GlobalStatus`]. Call [`ProgressReporter::stop`]
/// once the dispatcher is done so the task does not outlive the run.
pub struct ProgressReporter {
    handle: JoinHandle<()>,
    stop: CancellationToken,
    status: Arc<GlobalStatus>,
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Starts redrawing `bar` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(status: Arc<GlobalStatus>, bar: ProgressBar, interval: Duration) -> Self {
        bar.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let stop = CancellationToken::new();
        let handle = tokio::spawn(report_loop(
            Arc::clone(&status),
            bar.clone(),
            interval,
            stop.clone(),
        ));

        Self {
            handle,
            stop,
            status,
            bar,
        }
    }

    /// Stops the background task and leaves the final counters on screen.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            debug!(error = %e, "progress task ended abnormally");
        }
        self.bar
            .finish_with_message(render_status_line(&self.status.snapshot()));
    }
}

async fn report_loop(
    status: Arc<GlobalStatus>,
    bar: ProgressBar,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                bar.set_message(render_status_line(&status.snapshot()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_status_line_uses_human_bytes() {
        let snapshot = StatusSnapshot {
            total: 12,
            finished: 4,
            bytes_downloaded: 3 * 1024 * 1024,
            ..StatusSnapshot::default()
        };

        let line = render_status_line(&snapshot);

        assert!(line.starts_with("12 pages, 4 pages downloaded."), "{line}");
        assert!(line.contains("3.00 MiB"), "{line}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_refreshes_and_stops() {
        let status = Arc::new(GlobalStatus::new());
        status.set_total(2);
        let bar = ProgressBar::hidden();
        let reporter = ProgressReporter::spawn(
            Arc::clone(&status),
            bar.clone(),
            Duration::from_millis(500),
        );

        status.add_bytes(10);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(bar.message().starts_with("2 pages, 0 pages downloaded."));

        status.increment_finished();
        reporter.stop().await;

        assert!(bar.is_finished());
        assert!(bar.message().starts_with("2 pages, 1 pages downloaded."));
        assert!(bar.message().contains("10 B"), "{}", bar.message());
    }

    #[tokio::test]
    async fn test_reporter_does_not_touch_counters() {
        let status = Arc::new(GlobalStatus::new());
        status.set_total(3);
        let before = status.snapshot();

        let reporter = ProgressReporter::spawn(
            Arc::clone(&status),
            ProgressBar::hidden(),
            Duration::from_millis(1),
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        reporter.stop().await;

        assert_eq!(status.snapshot(), before);
    }
}
