//! Exit code logic for the downloader process.
//!
//! Single responsibility: map a finished book report to the process exit outcome.

use nli_downloader_core::BookReport;

use crate::ProcessExit;

/// Exhausted pages are reported but do not fail the process; an interrupted run does.
pub(crate) fn determine_exit_outcome(report: &BookReport) -> ProcessExit {
    if report.interrupted {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use nli_downloader_core::DispatchReport;

    use super::*;

    fn report(interrupted: bool) -> BookReport {
        BookReport {
            book_id: "B".to_string(),
            output_folder: PathBuf::from("images_B"),
            dispatch: DispatchReport::default(),
            bytes_downloaded: 0,
            interrupted,
        }
    }

    #[test]
    fn test_exit_outcome_success_when_run_completed() {
        assert_eq!(determine_exit_outcome(&report(false)), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_failure_when_interrupted() {
        assert_eq!(determine_exit_outcome(&report(true)), ProcessExit::Failure);
    }
}
