//! Show archiving workflow
//!
//! Walks a show's episode list in order and, per episode, writes the JSON
//! record, brings the media file into a verified state and fetches the
//! selected caption track.

use crate::catalog::{DEFAULT_API_BASE, EpisodeRecord, EpisodeSource};
use crate::download::MediaFetcher;
use crate::file_operations::{EpisodePaths, episode_paths, write_record};
use crate::integrity::{MediaProbe, ProbeConfig};
use crate::resume::{ResumeOutcome, RetryPolicy, ensure_verified};
use crate::{ArchiveError, ProgressEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for archiving a show
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Directory below which one folder per show is created
    pub output_root: PathBuf,
    /// Base URL of the content API
    pub api_base: String,
    /// How the integrity probe is run
    pub probe: ProbeConfig,
    /// How often a failing file is downloaded again
    pub retry: RetryPolicy,
    /// Upper bound for a single HTTP transfer, `None` for no limit
    pub transfer_timeout: Option<Duration>,
    /// Whether caption files are downloaded
    pub captions: bool,
}

impl ArchiveConfig {
    /// Creates a configuration with default settings writing below `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            probe: ProbeConfig::default(),
            retry: RetryPolicy::default(),
            transfer_timeout: Some(Duration::from_secs(60 * 60)),
            captions: true,
        }
    }
}

/// What happened to an episode's media file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// The resumption policy ran for the media file
    Media(ResumeOutcome),
    /// The catalog lists no media URL for the episode
    NoMediaUrl,
}

/// Per-episode result of an archive run
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Episode title as listed by the catalog
    pub title: String,
    /// Path of the media file
    pub media: PathBuf,
    pub outcome: EpisodeOutcome,
    /// Path of the caption file, if one is stored
    pub caption: Option<PathBuf>,
}

/// Result of archiving a show
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveReport {
    pub show_name: String,
    pub episodes: Vec<EpisodeSummary>,
}

impl ArchiveReport {
    fn count(&self, predicate: impl Fn(&EpisodeOutcome) -> bool) -> usize {
        self.episodes
            .iter()
            .filter(|episode| predicate(&episode.outcome))
            .count()
    }

    /// Episodes whose existing media passed verification
    pub fn kept(&self) -> usize {
        self.count(|o| matches!(o, EpisodeOutcome::Media(ResumeOutcome::Kept)))
    }

    /// Episodes whose media was downloaded in this run
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, EpisodeOutcome::Media(ResumeOutcome::Downloaded { .. })))
    }

    /// Episodes whose media kept failing verification
    pub fn exhausted(&self) -> usize {
        self.count(|o| matches!(o, EpisodeOutcome::Media(ResumeOutcome::Exhausted { .. })))
    }

    /// Episodes without a media URL
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EpisodeOutcome::NoMediaUrl))
    }
}

/// Archives every episode of a show, one at a time
///
/// # Arguments
///
/// * `show_slug` - The show's identifier in the catalog
/// * `source` - Enumerates the show's episodes
/// * `fetcher` - Downloads media and caption files
/// * `probe` - Verifies media files
/// * `config` - Output location, retry policy and caption switch
/// * `progress_callback` - Receives progress events
pub(crate) fn archive_episodes<S, D, P, F>(
    show_slug: &str,
    source: &S,
    fetcher: &D,
    probe: &P,
    config: &ArchiveConfig,
    progress_callback: &mut F,
) -> Result<ArchiveReport, ArchiveError>
where
    S: EpisodeSource + ?Sized,
    D: MediaFetcher + ?Sized,
    P: MediaProbe + ?Sized,
    F: FnMut(ProgressEvent),
{
    progress_callback(ProgressEvent::FetchingEpisodes {
        show_slug: show_slug.to_string(),
    });

    let episodes = source.fetch_episodes(show_slug)?;

    let show_name = episodes
        .first()
        .map(|e| e.show_name.clone())
        .unwrap_or_else(|| show_slug.to_string());

    progress_callback(ProgressEvent::EpisodesFound {
        show_name: show_name.clone(),
        count: episodes.len(),
    });

    let mut summaries = Vec::with_capacity(episodes.len());

    for (index, episode) in episodes.iter().enumerate() {
        progress_callback(ProgressEvent::ProcessingEpisode {
            index,
            total: episodes.len(),
            title: episode.title.clone(),
        });

        let summary = archive_episode(episode, fetcher, probe, config, progress_callback)?;
        summaries.push(summary);
    }

    let report = ArchiveReport {
        show_name,
        episodes: summaries,
    };

    progress_callback(ProgressEvent::ArchiveComplete {
        kept: report.kept(),
        downloaded: report.downloaded(),
        exhausted: report.exhausted(),
        skipped: report.skipped(),
    });

    Ok(report)
}

/// Archives a single episode
fn archive_episode<D, P, F>(
    episode: &EpisodeRecord,
    fetcher: &D,
    probe: &P,
    config: &ArchiveConfig,
    progress_callback: &mut F,
) -> Result<EpisodeSummary, ArchiveError>
where
    D: MediaFetcher + ?Sized,
    P: MediaProbe + ?Sized,
    F: FnMut(ProgressEvent),
{
    let paths = episode_paths(&config.output_root, episode);

    fs::create_dir_all(&paths.show_dir).map_err(|e| ArchiveError::WriteFailed {
        path: paths.show_dir.clone(),
        source: e,
    })?;

    write_record(&paths, episode).map_err(|e| ArchiveError::WriteFailed {
        path: paths.record.clone(),
        source: e,
    })?;

    let outcome = match &episode.media_url {
        Some(url) => {
            let outcome = ensure_verified(
                url,
                &paths.media,
                fetcher,
                probe,
                &config.retry,
                progress_callback,
            )?;
            progress_callback(ProgressEvent::MediaReady {
                path: paths.media.clone(),
                outcome,
            });
            EpisodeOutcome::Media(outcome)
        }
        None => {
            progress_callback(ProgressEvent::MissingMediaUrl {
                title: episode.title.clone(),
            });
            EpisodeOutcome::NoMediaUrl
        }
    };

    let caption = if config.captions {
        fetch_caption(episode, &paths, fetcher, progress_callback)?
    } else {
        None
    };

    Ok(EpisodeSummary {
        title: episode.title.clone(),
        media: paths.media,
        outcome,
        caption,
    })
}

/// Downloads the episode's preferred caption track unless already present
fn fetch_caption<D, F>(
    episode: &EpisodeRecord,
    paths: &EpisodePaths,
    fetcher: &D,
    progress_callback: &mut F,
) -> Result<Option<PathBuf>, ArchiveError>
where
    D: MediaFetcher + ?Sized,
    F: FnMut(ProgressEvent),
{
    let Some(spec) = episode.caption() else {
        progress_callback(ProgressEvent::NoCaption {
            title: episode.title.clone(),
        });
        return Ok(None);
    };

    let destination = paths.caption(spec.extension);

    if has_content(&destination) {
        progress_callback(ProgressEvent::CaptionPresent {
            path: destination.clone(),
        });
        return Ok(Some(destination));
    }

    fetcher.fetch(&spec.url, &destination, &mut |_, _| {})?;

    progress_callback(ProgressEvent::CaptionSaved {
        path: destination.clone(),
        format: spec.format,
    });

    Ok(Some(destination))
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
