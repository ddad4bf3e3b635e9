/// PBS Kids content API provider implementation.
use super::pbs_kids_types::{PbsEpisode, ProgramResponse};
use super::{CaptionTrack, CatalogError, EpisodeRecord, EpisodeSource};

/// Base URL of the public PBS Kids content API
pub const DEFAULT_API_BASE: &str = "https://content.services.pbskids.org/v2/kidspbsorg";

/// Air date used when an episode carries none
const UNKNOWN_AIR_DATE: &str = "0000-00-00";

/// Episode source for the PBS Kids content API.
///
/// This provider fetches a show's full-episode list from the
/// `programs/<slug>` endpoint.
pub struct PbsKidsCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PbsKidsCatalog {
    /// Creates a new catalog instance talking to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Converts one raw episode item to an `EpisodeRecord`.
    ///
    /// `show_slug` names the show when the item lacks program information.
    fn convert_episode(
        show_slug: &str,
        raw: serde_json::Value,
    ) -> Result<EpisodeRecord, CatalogError> {
        let episode: PbsEpisode = serde_json::from_value(raw.clone())
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        let air_date = episode
            .air_date
            .as_deref()
            .map(|date| date.chars().take(10).collect::<String>())
            .filter(|date| !date.is_empty())
            .unwrap_or_else(|| UNKNOWN_AIR_DATE.to_string());

        Ok(EpisodeRecord {
            show_name: episode
                .program
                .map(|p| p.title)
                .unwrap_or_else(|| show_slug.to_string()),
            title: episode.title,
            air_date,
            media_url: episode.mp4.filter(|url| !url.is_empty()),
            captions: episode
                .closed_captions
                .into_iter()
                .map(|cc| CaptionTrack {
                    format: cc.format,
                    url: cc.uri,
                })
                .collect(),
            raw,
        })
    }

    /// Extracts the episode records from a programs endpoint response.
    fn convert_program(
        show_slug: &str,
        response: ProgramResponse,
    ) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let items = response
            .collections
            .and_then(|c| c.episodes)
            .ok_or_else(|| {
                CatalogError::InvalidData("No episode collection in API response".to_string())
            })?
            .content;

        items
            .into_iter()
            .map(|item| Self::convert_episode(show_slug, item))
            .collect()
    }
}

impl EpisodeSource for PbsKidsCatalog {
    fn fetch_episodes(&self, show_slug: &str) -> Result<Vec<EpisodeRecord>, CatalogError> {
        let url = format!("{}/programs/{}", self.base_url, show_slug);
        tracing::debug!("fetching episode list from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| CatalogError::RequestError(e.to_string()))?;

        if response.status() == 404 {
            return Err(CatalogError::ShowNotFound(show_slug.to_string()));
        }

        if !response.status().is_success() {
            return Err(CatalogError::RequestError(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let program: ProgramResponse = response
            .json()
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Self::convert_program(show_slug, program)
    }
}
