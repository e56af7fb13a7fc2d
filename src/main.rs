//! CLI entry point for the NLI book downloader.

use std::process::ExitCode;

mod app;
mod cli;
mod output;

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The run completed, even if some pages exhausted their attempts.
    Success,
    /// Fatal error or interrupted run.
    Failure,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_downloader().await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
