//! Zip archive extraction

use std::fs::{self, File};
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Not a readable zip archive
    #[error("Failed to extract archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Extract every entry of the zip at `archive_path` into `dest`
///
/// Creates `dest` and intermediate directories, overwrites existing files,
/// and skips entries whose path would land outside `dest`. Returns the
/// number of files written.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    fs::create_dir_all(dest)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_path = match entry.enclosed_name() {
            Some(p) => dest.join(p),
            None => {
                tracing::warn!(entry = entry.name(), "Skipping archive entry outside destination");
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)?;
        } else {
            if let Some(parent) = entry_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&entry_path)?;
            io::copy(&mut entry, &mut outfile)?;
            written += 1;
        }
    }

    Ok(written)
}
