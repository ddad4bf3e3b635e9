/// Episode records and the sources that enumerate them.
///
/// This module provides the structures describing a show's episodes (titles,
/// air dates, media and caption URLs) as delivered by a remote catalog, the
/// caption selection rules, and the trait implemented by catalog providers.
mod pbs_kids;
mod pbs_kids_types;

pub use pbs_kids::{DEFAULT_API_BASE, PbsKidsCatalog};

use thiserror::Error;

/// Errors that can occur while enumerating episodes.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Request to the catalog service failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the service's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The requested show was not found
    #[error("Show not found: {0}")]
    ShowNotFound(String),

    /// The API returned invalid or unexpected data
    #[error("API returned invalid data: {0}")]
    InvalidData(String),
}

/// Caption formats the archiver knows how to store, with their file extensions.
pub const CAPTION_FORMATS: &[(&str, &str)] = &[
    ("SRT", "srt"),
    ("WebVTT", "vtt"),
    ("DFXP", "dfxp"),
    ("Caption-SAMI", "sami"),
];

/// A caption track offered for an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    /// Format label as reported by the service
    pub format: String,
    /// Download URL
    pub url: String,
}

/// The caption track chosen for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionSpec {
    pub url: String,
    /// File extension without the dot
    pub extension: &'static str,
    /// Format label as reported by the service
    pub format: String,
}

/// A single episode as enumerated by a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    /// Name of the show the episode belongs to
    pub show_name: String,
    /// Episode title
    pub title: String,
    /// Air date in `YYYY-MM-DD` form
    pub air_date: String,
    /// Direct media URL, if the episode has one
    pub media_url: Option<String>,
    /// Available caption tracks in service order
    pub captions: Vec<CaptionTrack>,
    /// The episode's original JSON item
    pub raw: serde_json::Value,
}

impl EpisodeRecord {
    /// Selects the caption track to download for this episode
    pub fn caption(&self) -> Option<CaptionSpec> {
        select_caption(&self.captions)
    }
}

/// Returns the extension for a caption format label, if the format is known
fn caption_extension(format: &str) -> Option<&'static str> {
    CAPTION_FORMATS
        .iter()
        .find(|(label, _)| *label == format)
        .map(|(_, ext)| *ext)
}

/// Chooses a caption track: any SRT track wins, otherwise the first track in a
/// known format. Tracks in unknown formats are never selected.
pub fn select_caption(tracks: &[CaptionTrack]) -> Option<CaptionSpec> {
    let chosen = tracks
        .iter()
        .find(|track| track.format.contains("SRT"))
        .map(|track| (track, "srt"))
        .or_else(|| {
            tracks
                .iter()
                .find_map(|track| caption_extension(&track.format).map(|ext| (track, ext)))
        });

    chosen.map(|(track, extension)| CaptionSpec {
        url: track.url.clone(),
        extension,
        format: track.format.clone(),
    })
}

/// Trait for catalogs that can enumerate a show's episodes.
pub trait EpisodeSource {
    /// Fetches all episode records of a show.
    ///
    /// # Arguments
    ///
    /// * `show_slug` - The show's identifier in the catalog, e.g. `peg-cat`
    ///
    /// # Returns
    ///
    /// The episodes in the order the catalog lists them
    fn fetch_episodes(&self, show_slug: &str) -> Result<Vec<EpisodeRecord>, CatalogError>;
}
