//! Download resumption policy
//!
//! Decides, per target file, whether an existing download can be kept or has
//! to be fetched again. Every file is verified before it is accepted, whether
//! it was already on disk or has just been downloaded. A file that fails is
//! deleted and downloaded again until the [`RetryPolicy`] runs out of
//! attempts.

use crate::download::MediaFetcher;
use crate::file_resolver::MediaFile;
use crate::integrity::{MediaProbe, Verdict, verify_media};
use crate::{ArchiveError, ProgressEvent};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not download again.
    NoRetry,
    /// Download after the given delay.
    RetryAfter(Duration),
}

/// Bounds how often a single file is downloaded within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of downloads per file, including the first (at least 1).
    pub max_attempts: u32,
    /// Pause before each repeated download.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Decide whether another download may start.
    ///
    /// `completed` is the number of downloads already made for this file.
    /// The first download never waits.
    pub fn decide(&self, completed: u32) -> RetryDecision {
        if completed >= self.max_attempts.max(1) {
            return RetryDecision::NoRetry;
        }

        if completed == 0 {
            RetryDecision::RetryAfter(Duration::ZERO)
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }
}

/// Lifecycle of a target file while the policy runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// No file at the destination
    Absent,
    /// A file from an earlier run exists but has not been checked
    PresentUnverified,
    /// The file passed verification
    VerifiedPass,
    /// The file failed verification and was removed
    VerifiedFailDeleted,
    /// A download just completed and awaits verification
    DownloadedFresh,
}

/// Final result of running the policy for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// An existing file passed verification and was kept
    Kept,
    /// The file was downloaded and passed verification
    Downloaded { attempts: u32 },
    /// Every permitted download failed verification; no file is left behind
    Exhausted { attempts: u32 },
}

/// Makes sure `destination` holds a verified copy of `url`
///
/// An existing file is verified first (against the server's announced size
/// when available) and kept if it passes. Otherwise the file is downloaded,
/// verified, and on failure deleted and downloaded again while `policy`
/// permits.
///
/// Transport failures and probe errors abort with an error; running out of
/// attempts does not, it is reported as [`ResumeOutcome::Exhausted`].
///
/// # Arguments
///
/// * `url` - Remote location of the media
/// * `destination` - Local path of the media file
/// * `fetcher` - Downloads the media
/// * `probe` - Judges the file's integrity
/// * `policy` - Bounds the number of downloads
/// * `progress_callback` - Receives progress events
pub(crate) fn ensure_verified<D, P, F>(
    url: &str,
    destination: &Path,
    fetcher: &D,
    probe: &P,
    policy: &RetryPolicy,
    progress_callback: &mut F,
) -> Result<ResumeOutcome, ArchiveError>
where
    D: MediaFetcher + ?Sized,
    P: MediaProbe + ?Sized,
    F: FnMut(ProgressEvent),
{
    let media = MediaFile::new(destination);
    let mut attempts: u32 = 0;
    let mut state = if media.exists() {
        FileState::PresentUnverified
    } else {
        FileState::Absent
    };

    loop {
        tracing::debug!("{}: {:?} after {} download(s)", destination.display(), state, attempts);

        state = match state {
            FileState::Absent | FileState::VerifiedFailDeleted => {
                match policy.decide(attempts) {
                    RetryDecision::NoRetry => {
                        progress_callback(ProgressEvent::GaveUp {
                            path: destination.to_path_buf(),
                            attempts,
                        });
                        return Ok(ResumeOutcome::Exhausted { attempts });
                    }
                    RetryDecision::RetryAfter(delay) => {
                        if !delay.is_zero() {
                            tracing::info!("waiting {:?} before downloading again", delay);
                            thread::sleep(delay);
                        }
                    }
                }

                attempts += 1;
                progress_callback(ProgressEvent::Downloading {
                    url: url.to_string(),
                    path: destination.to_path_buf(),
                    attempt: attempts,
                });

                let bytes = fetcher.fetch(url, destination, &mut |downloaded, total| {
                    progress_callback(ProgressEvent::DownloadProgress {
                        path: destination.to_path_buf(),
                        downloaded,
                        total,
                    })
                })?;
                tracing::debug!("downloaded {} bytes to {}", bytes, destination.display());

                FileState::DownloadedFresh
            }

            FileState::PresentUnverified | FileState::DownloadedFresh => {
                let expected_len = if state == FileState::PresentUnverified {
                    progress_callback(ProgressEvent::CheckingExisting {
                        path: destination.to_path_buf(),
                    });
                    fetcher.expected_len(url)
                } else {
                    None
                };

                match verify_media(probe, &media, expected_len)? {
                    Verdict::Pass => FileState::VerifiedPass,
                    Verdict::Fail(cause) => {
                        progress_callback(ProgressEvent::VerificationFailed {
                            path: destination.to_path_buf(),
                            cause,
                        });
                        fs::remove_file(destination).map_err(|e| ArchiveError::RemoveFailed {
                            path: destination.to_path_buf(),
                            source: e,
                        })?;
                        FileState::VerifiedFailDeleted
                    }
                }
            }

            FileState::VerifiedPass => {
                return Ok(if attempts == 0 {
                    ResumeOutcome::Kept
                } else {
                    ResumeOutcome::Downloaded { attempts }
                });
            }
        };
    }
}
