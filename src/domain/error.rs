use std::path::PathBuf;

use thiserror::Error;

/// Precondition failures that abort a batch run before any download starts.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("The file '{}' does not exist!", .0.display())]
    MissingLinksFile(PathBuf),

    #[error("Failed to create output directory '{}': {source}", .path.display())]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file '{}': {source}", .path.display())]
    ReadLinksFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No valid URLs found in the file!")]
    EmptyList,
}
