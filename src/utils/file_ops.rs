use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::{AudioError, Result};

pub struct FileEnumerator;

impl FileEnumerator {
    /// Lists the regular files directly inside `dir` whose lower-cased
    /// extension is in `allowlist`, sorted by file name.
    ///
    /// An empty result is not an error.
    pub fn enumerate(dir: impl AsRef<Path>, allowlist: &BTreeSet<String>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AudioError::NotFound(dir.to_path_buf()));
        }

        debug!("Scanning directory: {}", dir.display());
        let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Error accessing entry: {}", err);
                    None
                }
            })
            .filter(|e| {
                let is_file = e.file_type().is_file();
                let has_valid_ext = e
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| allowlist.contains(&ext.to_lowercase()));
                if is_file && !has_valid_ext {
                    debug!("Skipping non-audio file: {}", e.path().display());
                }
                is_file && has_valid_ext
            })
            .map(walkdir::DirEntry::into_path)
            .collect();

        debug!("Found {} matching files in {}", files.len(), dir.display());
        Ok(files)
    }
}

/// Runs `write` against a hidden sibling of `destination`, then renames it
/// into place. On failure the partial file is removed and `destination` is
/// left untouched.
pub fn write_atomically<F>(destination: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let file_name = destination.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid file path")
    })?;
    let mut partial_name = std::ffi::OsString::from(".");
    partial_name.push(file_name);
    partial_name.push(".part");
    let partial = destination.with_file_name(partial_name);

    match write(&partial) {
        Ok(()) => {
            fs::rename(&partial, destination)?;
            Ok(())
        }
        Err(e) => {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    warn!("Could not remove partial file {}: {}", partial.display(), cleanup);
                }
            }
            Err(e)
        }
    }
}

/// True when both paths resolve to the same existing location.
pub fn same_location(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
