/// PBS Kids content API response types for deserialization.
///
/// These structures mirror the parts of the `programs/<slug>` JSON response
/// that the archiver reads. Unknown fields are ignored.
use serde::Deserialize;

/// The top-level response from the programs endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct ProgramResponse {
    pub collections: Option<Collections>,
}

/// Named collections attached to a program.
#[derive(Debug, Deserialize)]
pub(super) struct Collections {
    pub episodes: Option<EpisodeCollection>,
}

/// The full-episode collection.
///
/// Items are kept as raw JSON so each record can be written next to its
/// media file unchanged.
#[derive(Debug, Deserialize)]
pub(super) struct EpisodeCollection {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
}

/// A single episode item.
#[derive(Debug, Deserialize)]
pub(super) struct PbsEpisode {
    /// Episode title
    pub title: String,
    /// Air date as an ISO 8601 timestamp, e.g. `2024-03-01T05:00:00Z`
    pub air_date: Option<String>,
    /// Direct MP4 URL (absent for some items)
    pub mp4: Option<String>,
    /// Caption tracks in the formats the service offers
    #[serde(rename = "closedCaptions", default)]
    pub closed_captions: Vec<PbsCaption>,
    /// The program this episode belongs to
    pub program: Option<PbsProgram>,
}

/// A caption track reference.
#[derive(Debug, Deserialize)]
pub(super) struct PbsCaption {
    /// Format label such as `SRT`, `WebVTT`, `DFXP` or `Caption-SAMI`
    pub format: String,
    #[serde(rename = "URI")]
    pub uri: String,
}

/// Program summary embedded in each episode.
#[derive(Debug, Deserialize)]
pub(super) struct PbsProgram {
    pub title: String,
}
