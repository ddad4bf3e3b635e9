//! Temporary file management module
//!
//! This module provides RAII-based handling of scratch files with automatic
//! cleanup. Downloads are staged in guarded `.part` files so an aborted
//! transfer never leaves a half-written file under its final name. Tests also
//! get guarded scratch directories.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for temporary resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Temporary file that will be deleted when dropped
    File(PathBuf),
    /// Temporary directory that will be deleted recursively when dropped
    #[cfg(test)]
    Directory(PathBuf),
}

impl TempGuard {
    /// Get the path to the temporary resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::File(path) => path,
            #[cfg(test)]
            TempGuard::Directory(path) => path,
        }
    }

    /// Moves the guarded file to `destination`, keeping it past the guard's drop.
    ///
    /// Any existing file at `destination` is replaced.
    pub(crate) fn persist(self, destination: &Path) -> io::Result<()> {
        // The guard's drop afterwards targets a path that no longer exists.
        fs::rename(self.path(), destination)
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        match self {
            TempGuard::File(path) => {
                // Silently ignore errors during cleanup
                let _ = fs::remove_file(path);
            }
            #[cfg(test)]
            TempGuard::Directory(path) => {
                let _ = fs::remove_dir_all(path);
            }
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates the staging file for a download targeting `destination`
///
/// The staging file lives next to the destination with a `.part` suffix
/// appended (`episode.mp4` becomes `episode.mp4.part`), so the final rename
/// stays on the same filesystem. A leftover part file from an interrupted run
/// is truncated.
///
/// # Returns
///
/// The opened file handle together with a guard that removes the staging file
/// unless it is persisted.
pub(crate) fn create_part_file(destination: &Path) -> io::Result<(File, TempGuard)> {
    let mut name: OsString = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");

    let path = destination.with_file_name(name);
    let file = File::create(&path)?;

    Ok((file, TempGuard::File(path)))
}

/// Creates a temporary directory and returns a guard that removes it on drop
///
/// The directory is created in the system's temporary directory with a unique
/// name generated using ULID (monotonic, sortable unique identifier).
#[cfg(test)]
pub(crate) fn create_temp_dir(prefix: &str) -> io::Result<TempGuard> {
    let ulid = ulid::Ulid::new();
    let path = std::env::temp_dir().join(format!("{}_{}", prefix, ulid));

    fs::create_dir_all(&path)?;

    Ok(TempGuard::Directory(path))
}
