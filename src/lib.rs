//! pbskids_archive - Archive PBS Kids episodes and keep the archive intact
//!
//! This library downloads a show's episodes together with their caption files
//! and makes sure every media file on disk is complete: existing files are
//! probed with ffmpeg, and damaged ones are deleted and fetched again.

mod archive;
mod catalog;
mod download;
mod file_operations;
mod file_resolver;
mod integrity;
pub mod logging;
mod resume;
mod temp;

use archive::archive_episodes;
use file_resolver::resolve_targets;
use integrity::verify_media;

// Re-export error types
pub use catalog::CatalogError;
pub use download::DownloadError;
pub use file_resolver::FileResolverError;
pub use integrity::IntegrityError;

// Re-export the public building blocks
pub use archive::{ArchiveConfig, ArchiveReport, EpisodeOutcome, EpisodeSummary};
pub use catalog::{
    CAPTION_FORMATS, CaptionSpec, CaptionTrack, DEFAULT_API_BASE, EpisodeRecord, EpisodeSource,
    PbsKidsCatalog, select_caption,
};
pub use download::{HttpFetcher, MediaFetcher};
pub use file_operations::{EpisodePaths, episode_paths, sanitize_title};
pub use file_resolver::{MEDIA_SUFFIXES, MediaFile, has_media_suffix};
pub use integrity::{FailureCause, FfmpegProbe, MediaProbe, ProbeConfig, Verdict};
pub use resume::{FileState, ResumeOutcome, RetryDecision, RetryPolicy};

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Progress event emitted during verification and archiving
///
/// These events allow library users to track progress and provide feedback
/// while files are checked and downloaded.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Batch verification started
    VerifyStarted {
        target: PathBuf,
        file_count: usize,
        directory_mode: bool,
    },

    /// Verifying a specific file
    VerifyingFile {
        index: usize,
        total: usize,
        path: PathBuf,
    },

    /// A file's verdict is known
    FileVerified { path: PathBuf, verdict: Verdict },

    /// Directory-mode verification finished
    VerifyComplete { passed: usize, failed: usize },

    /// Fetching the show's episode list
    FetchingEpisodes { show_slug: String },

    /// Episode list received
    EpisodesFound { show_name: String, count: usize },

    /// Processing a specific episode
    ProcessingEpisode {
        index: usize,
        total: usize,
        title: String,
    },

    /// The catalog lists no media for the episode
    MissingMediaUrl { title: String },

    /// Verifying a media file left by an earlier run
    CheckingExisting { path: PathBuf },

    /// A media file failed verification and is being removed
    VerificationFailed { path: PathBuf, cause: FailureCause },

    /// A media download is starting
    Downloading {
        url: String,
        path: PathBuf,
        attempt: u32,
    },

    /// Bytes received for the current media download
    DownloadProgress {
        path: PathBuf,
        downloaded: u64,
        total: Option<u64>,
    },

    /// Every permitted download of a file failed verification
    GaveUp { path: PathBuf, attempts: u32 },

    /// The resumption policy finished for a media file
    MediaReady {
        path: PathBuf,
        outcome: ResumeOutcome,
    },

    /// A caption file was downloaded
    CaptionSaved { path: PathBuf, format: String },

    /// The caption file already exists
    CaptionPresent { path: PathBuf },

    /// No caption track in a supported format
    NoCaption { title: String },

    /// Archiving complete
    ArchiveComplete {
        kept: usize,
        downloaded: usize,
        exhausted: usize,
        skipped: usize,
    },
}

/// Top-level error type for archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Error while locating files to verify
    #[error("File resolution error: {0}")]
    FileResolver(#[from] FileResolverError),

    /// Error that prevented a verification verdict
    #[error("Verification error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Error while enumerating episodes
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error while downloading
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// A damaged file could not be removed
    #[error("Failed to remove {path}: {source}")]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// An output file or directory could not be written
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Verdicts of a verification run, in processing order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// True when the target was a directory
    pub directory_mode: bool,
    /// Each verified file with its verdict
    pub results: Vec<(PathBuf, Verdict)>,
}

impl BatchReport {
    /// Files that did not pass, in processing order
    pub fn failures(&self) -> Vec<&Path> {
        self.results
            .iter()
            .filter(|(_, verdict)| !verdict.is_pass())
            .map(|(path, _)| path.as_path())
            .collect()
    }

    /// Number of files that passed
    pub fn passed(&self) -> usize {
        self.results.len() - self.failures().len()
    }

    /// Mapping of file path to verdict
    pub fn verdicts(&self) -> BTreeMap<String, &Verdict> {
        self.results
            .iter()
            .map(|(path, verdict)| (path.display().to_string(), verdict))
            .collect()
    }

    /// The path to verdict mapping as a JSON object, e.g. `{"/a.mp4": "pass"}`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.verdicts())
    }
}

/// Verifies a media file, or every media file in a directory
///
/// A directory is expanded to the files directly inside it that carry a media
/// suffix, processed in file name order. Any other path is verified as a
/// single file; a path that does not exist yields
/// `FileResolverError::NotFound`.
///
/// Progress events are emitted through the provided callback.
///
/// # Arguments
///
/// * `target` - File or directory to verify
/// * `probe` - The probe used to judge each file
/// * `progress_callback` - Closure called with progress events
///
/// # Examples
///
/// ```no_run
/// use pbskids_archive::{FfmpegProbe, verify_path};
/// use std::path::Path;
///
/// let probe = FfmpegProbe::default();
/// let report = verify_path(Path::new("/archive/Peg + Cat"), &probe, |_| {}).unwrap();
///
/// for path in report.failures() {
///     println!("damaged: {}", path.display());
/// }
/// ```
pub fn verify_path<P, F>(
    target: &Path,
    probe: &P,
    mut progress_callback: F,
) -> Result<BatchReport, ArchiveError>
where
    P: MediaProbe + ?Sized,
    F: FnMut(ProgressEvent),
{
    let directory_mode = target.is_dir();
    let files = resolve_targets(target)?;

    progress_callback(ProgressEvent::VerifyStarted {
        target: target.to_path_buf(),
        file_count: files.len(),
        directory_mode,
    });

    let mut results = Vec::with_capacity(files.len());

    for (index, media) in files.iter().enumerate() {
        progress_callback(ProgressEvent::VerifyingFile {
            index,
            total: files.len(),
            path: media.path.clone(),
        });

        let verdict = verify_media(probe, media, None)?;

        progress_callback(ProgressEvent::FileVerified {
            path: media.path.clone(),
            verdict: verdict.clone(),
        });

        results.push((media.path.clone(), verdict));
    }

    let report = BatchReport {
        directory_mode,
        results,
    };

    if directory_mode {
        progress_callback(ProgressEvent::VerifyComplete {
            passed: report.passed(),
            failed: report.failures().len(),
        });
    }

    Ok(report)
}

/// Downloads a show's episodes and captions into `config.output_root`
///
/// Episodes are processed one at a time in catalog order. Media files already
/// on disk are verified and kept when intact; missing or damaged ones are
/// downloaded and verified according to `config.retry`.
///
/// The ffmpeg probe is checked up front, so a missing tool aborts before
/// anything is downloaded.
///
/// # Examples
///
/// ```no_run
/// use pbskids_archive::{ArchiveConfig, ProgressEvent, archive_show};
///
/// let config = ArchiveConfig::new("/archive");
/// let report = archive_show("peg-cat", &config, |event| {
///     if let ProgressEvent::ProcessingEpisode { index, total, title } = event {
///         println!("[{}/{}] {}", index + 1, total, title);
///     }
/// })
/// .unwrap();
/// println!("{} episode(s) downloaded", report.downloaded());
/// ```
pub fn archive_show<F>(
    show_slug: &str,
    config: &ArchiveConfig,
    mut progress_callback: F,
) -> Result<ArchiveReport, ArchiveError>
where
    F: FnMut(ProgressEvent),
{
    let probe = FfmpegProbe::new(config.probe.clone());
    probe.ensure_available()?;

    let catalog = PbsKidsCatalog::new(config.api_base.as_str());
    let fetcher = HttpFetcher::new(config.transfer_timeout)?;

    archive_episodes(
        show_slug,
        &catalog,
        &fetcher,
        &probe,
        config,
        &mut progress_callback,
    )
}
