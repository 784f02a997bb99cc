//! Low-level fetch primitives shared by the repository handlers
//!
//! HTTP downloads, tar extraction and external tool invocation. None of these
//! know about dependency configs; handlers compose them.

pub mod archive;
pub mod command;
pub mod http;

pub use archive::ArchiveError;
pub use command::{CommandError, quote};
pub use http::{DownloadError, HttpClient};

use std::path::Path;
use tempfile::TempPath;

/// Empty file inside `dir` that holds a download until it is extracted.
/// Dropping the returned path deletes the file, including when the fetch
/// future is cancelled mid-download.
pub(crate) fn staging_file(dir: &Path) -> std::io::Result<TempPath> {
    tempfile::Builder::new()
        .prefix(".depfetch-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staging_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = staging_file(dir.path()).unwrap();

        let name = staged.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".depfetch-") && name.ends_with(".partial"));
        assert!(staged.exists());

        drop(staged);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
