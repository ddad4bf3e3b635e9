//! File resolver module for locating media files to verify
//!
//! This module expands a user-supplied path into the list of media files that
//! batch verification should look at. Media files are recognized by their
//! suffix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File suffixes (without the dot) treated as media, compared case-insensitively
pub const MEDIA_SUFFIXES: &[&str] = &["mp4", "mpg", "avi"];

/// Errors that can occur during file resolution
#[derive(Debug, Error)]
pub enum FileResolverError {
    /// Path does not exist
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    /// Failed to read directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),
}

/// Represents a media file on local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Path to the media file
    pub path: PathBuf,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns true if the file is present on disk
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Size of the file in bytes
    pub fn size(&self) -> io::Result<u64> {
        fs::metadata(&self.path).map(|m| m.len())
    }
}

/// Returns true if the path carries one of the recognized media suffixes
pub fn has_media_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            MEDIA_SUFFIXES
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Expands a verification target into the media files to inspect
///
/// A file is returned as-is, whatever its suffix, since the caller named it
/// explicitly. A directory is expanded to its direct children that are
/// regular files with a media suffix, sorted by file name. Subdirectories are
/// not descended into.
///
/// # Arguments
///
/// * `target` - The file or directory path to resolve
///
/// # Returns
///
/// The media files to verify, or `FileResolverError::NotFound` if the target
/// does not exist.
pub(crate) fn resolve_targets(target: &Path) -> Result<Vec<MediaFile>, FileResolverError> {
    if target.is_dir() {
        scan_for_media(target)
    } else if target.exists() {
        Ok(vec![MediaFile::new(target)])
    } else {
        Err(FileResolverError::NotFound(target.to_path_buf()))
    }
}

/// Lists the media files directly inside a directory, sorted by file name
pub(crate) fn scan_for_media(dir_path: &Path) -> Result<Vec<MediaFile>, FileResolverError> {
    let entries = fs::read_dir(dir_path).map_err(|e| FileResolverError::ReadDirectoryFailed {
        path: dir_path.to_path_buf(),
        source: e,
    })?;

    let mut media_files = Vec::new();

    for entry in entries {
        let path = entry?.path();

        if path.is_file() && has_media_suffix(&path) {
            media_files.push(MediaFile { path });
        }
    }

    media_files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    Ok(media_files)
}
