//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

use nli_downloader_core::default_output_folder;

/// Download a digitized book from the National Library of Israel.
///
/// Every page is saved as `<index>.tiff` in the output folder. Pages that
/// cannot be downloaded are listed at the end with their direct URL.
#[derive(Parser, Debug)]
#[command(name = "nli-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Book id, as found in the NLI viewer URL
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub book_id: String,

    /// Folder to save the pages in [default: ./images_<BOOK_ID>]
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output_folder: Option<PathBuf>,
}

impl Args {
    /// Returns the output folder, falling back to `./images_<book_id>`.
    #[must_use]
    pub fn resolved_output_folder(&self) -> PathBuf {
        self.output_folder
            .clone()
            .unwrap_or_else(|| default_output_folder(&self.book_id))
    }
}
