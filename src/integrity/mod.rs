//! Media integrity verification
//!
//! This module decides whether a downloaded media file is complete and
//! undamaged. The decision is delegated to a [`MediaProbe`]; the bundled
//! implementation runs ffmpeg in an audio-only copy mode, which fails fast on
//! truncated or corrupted containers without decoding any video.

mod ffmpeg;

pub use ffmpeg::{FfmpegProbe, ProbeConfig};

#[cfg(test)]
pub(crate) use ffmpeg::tests as ffmpeg_tests;

use crate::file_resolver::MediaFile;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that prevent a verdict from being reached
///
/// A file that exists but is damaged is not an error; it yields
/// [`Verdict::Fail`].
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The probe binary is missing or cannot be executed
    #[error("Media probe {binary} is not available: {source}")]
    Environment { binary: PathBuf, source: io::Error },

    /// The file to verify does not exist
    #[error("File to verify does not exist: {0}")]
    NotFound(PathBuf),

    /// The probe did not finish within its time budget and was killed
    #[error("Probe of {path} did not finish within {timeout:?}")]
    Timeout { path: PathBuf, timeout: Duration },

    /// Running the probe or inspecting the file failed
    #[error("Failed to probe {path}: {source}")]
    ProbeFailed { path: PathBuf, source: io::Error },
}

/// Why a file failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The file has no content at all
    Empty,
    /// The on-disk size differs from the size announced by the server
    SizeMismatch { expected: u64, actual: u64 },
    /// The probe printed diagnostics while reading the file
    Diagnostics(String),
    /// The probe exited unsuccessfully without printing anything
    DecoderExit(Option<i32>),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Empty => write!(f, "file is empty"),
            FailureCause::SizeMismatch { expected, actual } => {
                write!(f, "expected {} bytes, found {}", expected, actual)
            }
            FailureCause::Diagnostics(text) => {
                let first_line = text.lines().next().unwrap_or_default();
                write!(f, "probe reported: {}", first_line)
            }
            FailureCause::DecoderExit(Some(code)) => write!(f, "probe exited with code {}", code),
            FailureCause::DecoderExit(None) => write!(f, "probe was terminated by a signal"),
        }
    }
}

/// Outcome of verifying a single media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The file is complete and readable
    Pass,
    /// The file is truncated or damaged
    Fail(FailureCause),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Short lowercase label, `"pass"` or `"fail"`
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail(_) => "fail",
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Trait for tools that can judge the integrity of a media file
pub trait MediaProbe {
    /// Inspects an existing file and returns a verdict
    ///
    /// Implementations may assume `path` exists; [`verify_media`] checks that
    /// before calling the probe.
    fn probe(&self, path: &Path) -> Result<Verdict, IntegrityError>;
}

/// Verifies a local media file
///
/// Cheap checks run first: a missing file is reported as
/// `IntegrityError::NotFound`, an empty file fails, and when the expected byte
/// length is known a size mismatch fails without spawning the probe.
/// Everything else is decided by `probe`.
///
/// Calling this twice on an unmodified file yields the same verdict.
///
/// # Arguments
///
/// * `probe` - The probe used for the content check
/// * `media` - The file to verify
/// * `expected_len` - The size announced by the server, if known
pub fn verify_media<P: MediaProbe + ?Sized>(
    probe: &P,
    media: &MediaFile,
    expected_len: Option<u64>,
) -> Result<Verdict, IntegrityError> {
    if !media.path.exists() {
        return Err(IntegrityError::NotFound(media.path.clone()));
    }

    let actual = media.size().map_err(|e| IntegrityError::ProbeFailed {
        path: media.path.clone(),
        source: e,
    })?;

    if actual == 0 {
        return Ok(Verdict::Fail(FailureCause::Empty));
    }

    if let Some(expected) = expected_len {
        if expected != actual {
            tracing::debug!(
                "size mismatch for {}: expected {}, found {}",
                media.path.display(),
                expected,
                actual
            );
            return Ok(Verdict::Fail(FailureCause::SizeMismatch { expected, actual }));
        }
    }

    probe.probe(&media.path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::temp::create_temp_dir;
    use std::cell::Cell;
    use std::fs;

    /// Probe that returns a fixed verdict and counts its invocations
    pub(crate) struct FixedProbe {
        pub verdict: Verdict,
        pub calls: Cell<usize>,
    }

    impl FixedProbe {
        pub(crate) fn new(verdict: Verdict) -> Self {
            Self {
                verdict,
                calls: Cell::new(0),
            }
        }
    }

    impl MediaProbe for FixedProbe {
        fn probe(&self, _path: &Path) -> Result<Verdict, IntegrityError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.verdict.clone())
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let probe = FixedProbe::new(Verdict::Pass);
        let media = MediaFile::new("/nonexistent/episode.mp4");

        let result = verify_media(&probe, &media, None);

        assert!(matches!(result, Err(IntegrityError::NotFound(_))));
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_empty_file_fails_without_probe() {
        let dir = create_temp_dir("verify_empty").unwrap();
        let media = MediaFile::new(dir.join("empty.mp4"));
        fs::write(&media.path, b"").unwrap();

        let probe = FixedProbe::new(Verdict::Pass);
        let verdict = verify_media(&probe, &media, None).unwrap();

        assert_eq!(verdict, Verdict::Fail(FailureCause::Empty));
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_size_mismatch_fails_without_probe() {
        let dir = create_temp_dir("verify_size").unwrap();
        let media = MediaFile::new(dir.join("short.mp4"));
        fs::write(&media.path, vec![1u8; 50]).unwrap();

        let probe = FixedProbe::new(Verdict::Pass);
        let verdict = verify_media(&probe, &media, Some(100)).unwrap();

        assert_eq!(
            verdict,
            Verdict::Fail(FailureCause::SizeMismatch {
                expected: 100,
                actual: 50
            })
        );
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn test_matching_size_defers_to_probe() {
        let dir = create_temp_dir("verify_defer").unwrap();
        let media = MediaFile::new(dir.join("full.mp4"));
        fs::write(&media.path, vec![1u8; 100]).unwrap();

        let probe = FixedProbe::new(Verdict::Pass);

        assert_eq!(verify_media(&probe, &media, Some(100)).unwrap(), Verdict::Pass);
        assert_eq!(verify_media(&probe, &media, None).unwrap(), Verdict::Pass);
        assert_eq!(probe.calls.get(), 2);
    }

    #[test]
    fn test_verdict_serializes_as_label() {
        let json = serde_json::to_string(&vec![
            Verdict::Pass,
            Verdict::Fail(FailureCause::DecoderExit(Some(1))),
        ])
        .unwrap();
        assert_eq!(json, r#"["pass","fail"]"#);
    }

    #[test]
    fn test_failure_cause_display_uses_first_line() {
        let cause = FailureCause::Diagnostics("moov atom not found\nInvalid data".to_string());
        assert_eq!(cause.to_string(), "probe reported: moov atom not found");
    }
}
