use anyhow::{Context, Result};
use clap::Parser;
use nli_downloader_core::BookDownloader;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::config::EnvConfig;
use crate::app::{exit_handler, terminal};
use crate::cli::Args;
use crate::output;

/// Log level used when `RUST_LOG` is unset. The progress line owns stdout,
/// so only problems are logged by default.
const DEFAULT_LOG_LEVEL: &str = "warn";

pub(crate) async fn run_downloader() -> Result<ProcessExit> {
    // Parse before tracing so --help and usage errors print cleanly.
    let args = Args::parse();

    terminal::init_tracing(DEFAULT_LOG_LEVEL, terminal::is_no_color_requested());
    debug!(?args, "CLI arguments parsed");

    let config = EnvConfig::from_env()?;
    debug!(?config, "environment configuration loaded");

    let options = config.into_options(terminal::should_draw_progress(terminal::is_dumb_terminal()));
    let downloader = BookDownloader::new(options)?;
    let folder = args.resolved_output_folder();

    info!(book_id = %args.book_id, folder = %folder.display(), "downloading book");
    output::print_missing_folder_notice(&folder);

    let cancel = CancellationToken::new();
    let interrupt_listener = spawn_interrupt_listener(cancel.clone());

    let result = downloader
        .download_book(&args.book_id, &folder, cancel)
        .await;
    interrupt_listener.abort();

    let report = result.with_context(|| format!("failed to download book {}", args.book_id))?;

    output::print_report(&report);

    if report.interrupted {
        warn!(
            succeeded = report.dispatch.succeeded(),
            total = report.total_pages(),
            "Interrupted. Run again to fetch the remaining pages."
        );
    }

    Ok(exit_handler::determine_exit_outcome(&report))
}

/// First Ctrl+C cancels the run; a second one exits at once.
fn spawn_interrupt_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received, stopping page downloads");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt received, exiting");
            std::process::exit(i32::from(ProcessExit::Failure.code()));
        }
    })
}
