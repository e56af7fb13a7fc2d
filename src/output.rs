//! CLI output formatting for a finished book download.

use std::path::Path;

use indicatif::HumanBytes;
use nli_downloader_core::{BookReport, DownloadTask};

/// Notice printed before a missing output folder is created.
pub(crate) fn missing_folder_line(folder: &Path) -> String {
    format!("{} doesn't exist, trying to create it...", folder.display())
}

/// Prints [`missing_folder_line`] when `folder` is not a directory yet.
pub(crate) fn print_missing_folder_notice(folder: &Path) {
    if !folder.is_dir() {
        println!("{}", missing_folder_line(folder));
    }
}

/// Line printed for a page that exhausted its attempts.
pub(crate) fn failed_page_line(task: &DownloadTask) -> String {
    format!(
        "Failed to download page {}, you can download it yourself from: {}",
        task.page.index, task.page.source_url
    )
}

/// Closing summary for the run.
pub(crate) fn summary_line(report: &BookReport) -> String {
    let succeeded = report.dispatch.succeeded();
    let total = report.total_pages();
    let folder = report.output_folder.display();

    if report.interrupted {
        return format!(
            "Interrupted: {succeeded} of {total} pages downloaded to {folder}. Run again to fetch the rest."
        );
    }

    let failed = report.dispatch.exhausted().count();
    let mut line = format!(
        "Downloaded {succeeded} of {total} pages to {folder} ({})",
        HumanBytes(report.bytes_downloaded)
    );
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }
    line
}

/// Every line printed after the progress bar finishes, in order.
pub(crate) fn report_lines(report: &BookReport) -> Vec<String> {
    report
        .dispatch
        .exhausted()
        .map(failed_page_line)
        .chain(std::iter::once(summary_line(report)))
        .collect()
}

/// Prints the run report to stdout.
pub(crate) fn print_report(report: &BookReport) {
    for line in report_lines(report) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use nli_downloader_core::{DispatchReport, PageDescriptor, TaskState};

    use super::*;

    fn task(index: usize, state: TaskState) -> DownloadTask {
        let page = PageDescriptor::new(
            index,
            format!("FL{index}"),
            "http://dl.test/?pid=",
            Path::new("out"),
        );
        DownloadTask {
            state,
            ..DownloadTask::new(page)
        }
    }

    fn report(tasks: Vec<DownloadTask>, interrupted: bool) -> BookReport {
        BookReport {
            book_id: "B".to_string(),
            output_folder: PathBuf::from("out"),
            dispatch: DispatchReport::from_tasks(tasks),
            bytes_downloaded: 2048,
            interrupted,
        }
    }

    #[test]
    fn test_failed_page_line_names_index_and_url() {
        let line = failed_page_line(&task(7, TaskState::Exhausted));
        assert_eq!(
            line,
            "Failed to download page 7, you can download it yourself from: http://dl.test/?pid=FL7"
        );
    }

    #[test]
    fn test_missing_folder_line_names_the_folder() {
        assert_eq!(
            missing_folder_line(Path::new("images_B")),
            "images_B doesn't exist, trying to create it..."
        );
    }

    #[test]
    fn test_report_lines_list_failures_before_summary() {
        let lines = report_lines(&report(
            vec![
                task(0, TaskState::Succeeded),
                task(1, TaskState::Exhausted),
                task(2, TaskState::Succeeded),
            ],
            false,
        ));

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Failed to download page 1,"));
        assert_eq!(lines[1], "Downloaded 2 of 3 pages to out (2.00 KiB), 1 failed");
    }

    #[test]
    fn test_summary_for_interrupted_run() {
        let line = summary_line(&report(
            vec![task(0, TaskState::Succeeded), task(1, TaskState::Cancelled)],
            true,
        ));
        assert!(line.starts_with("Interrupted: 1 of 2 pages"), "{line}");
    }
}
