use crate::catalog::EpisodeRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Locations of everything archived for one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePaths {
    /// Directory holding all files of the show
    pub show_dir: PathBuf,
    /// The episode's media file (`.mp4`)
    pub media: PathBuf,
    /// The episode's JSON record (`.json`)
    pub record: PathBuf,
    /// Common stem; caption files append their own extension
    pub stem: PathBuf,
}

impl EpisodePaths {
    /// Path of the caption file with the given extension (without dot)
    pub fn caption(&self, extension: &str) -> PathBuf {
        with_appended_extension(&self.stem, extension)
    }
}

/// Sanitizes a title for use in filenames
///
/// - `/` becomes `; ` and `: ` becomes `_`
/// - Any remaining `:` becomes `_`
/// - Reserved characters `? \ * " < > |` and control characters are removed
/// - Leading/trailing whitespace and dots are trimmed
pub fn sanitize_title(title: &str) -> String {
    let mapped = title.replace('/', "; ").replace(": ", "_").replace(':', "_");

    let sanitized: String = mapped
        .chars()
        .filter(|c| !matches!(c, '?' | '\\' | '*' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();

    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Appends `.extension` to a path without replacing anything after a dot
/// already present in the file name
fn with_appended_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Computes where an episode is stored below `output_root`
///
/// Layout: `<root>/<show>/<air date> - <title>.<ext>`
///
/// # Examples
///
/// ```ignore
/// let paths = episode_paths(Path::new("/archive"), &record);
/// // /archive/Peg + Cat/2023-05-01 - The Big Problem.mp4
/// ```
pub fn episode_paths(output_root: &Path, episode: &EpisodeRecord) -> EpisodePaths {
    let show_dir = output_root.join(sanitize_title(&episode.show_name));
    let stem = show_dir.join(format!(
        "{} - {}",
        episode.air_date,
        sanitize_title(&episode.title)
    ));

    EpisodePaths {
        media: with_appended_extension(&stem, "mp4"),
        record: with_appended_extension(&stem, "json"),
        show_dir,
        stem,
    }
}

/// Writes an episode's JSON record next to its media
pub fn write_record(paths: &EpisodePaths, episode: &EpisodeRecord) -> io::Result<()> {
    let content = serde_json::to_string_pretty(&episode.raw).map_err(io::Error::other)?;
    fs::write(&paths.record, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::create_temp_dir;

    fn record(show: &str, title: &str, air_date: &str) -> EpisodeRecord {
        EpisodeRecord {
            show_name: show.to_string(),
            title: title.to_string(),
            air_date: air_date.to_string(),
            media_url: None,
            captions: Vec::new(),
            raw: serde_json::json!({ "title": title }),
        }
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Normal Title"), "Normal Title");
        assert_eq!(sanitize_title("Daniel/Katerina"), "Daniel; Katerina");
        assert_eq!(sanitize_title("Peg: The Movie"), "Peg_The Movie");
        assert_eq!(sanitize_title("Why? \"Because\" <yes> | *no*"), "Why Because yes  no");
        assert_eq!(sanitize_title("Back\\slash"), "Backslash");
        assert_eq!(sanitize_title("  ...dots...  "), "dots");
        assert_eq!(sanitize_title("Tab\there"), "Tabhere");
    }

    #[test]
    fn test_episode_paths() {
        let episode = record("Peg + Cat", "The Big Problem / The Pirate Problem", "2023-05-01");
        let paths = episode_paths(Path::new("/archive"), &episode);

        assert_eq!(paths.show_dir, PathBuf::from("/archive/Peg + Cat"));
        assert_eq!(
            paths.media,
            PathBuf::from("/archive/Peg + Cat/2023-05-01 - The Big Problem ;  The Pirate Problem.mp4")
        );
        assert_eq!(
            paths.record,
            PathBuf::from("/archive/Peg + Cat/2023-05-01 - The Big Problem ;  The Pirate Problem.json")
        );
        assert_eq!(
            paths.caption("srt"),
            PathBuf::from("/archive/Peg + Cat/2023-05-01 - The Big Problem ;  The Pirate Problem.srt")
        );
    }

    #[test]
    fn test_title_with_dot_keeps_full_name() {
        let episode = record("Show", "Mr. Rogers", "2001-01-01");
        let paths = episode_paths(Path::new("/a"), &episode);
        assert_eq!(paths.media, PathBuf::from("/a/Show/2001-01-01 - Mr. Rogers.mp4"));
    }

    #[test]
    fn test_write_record() {
        let dir = create_temp_dir("write_record").unwrap();
        let episode = record("Show", "Episode", "2020-02-02");
        let paths = episode_paths(&dir, &episode);
        fs::create_dir_all(&paths.show_dir).unwrap();

        write_record(&paths, &episode).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.record).unwrap()).unwrap();
        assert_eq!(saved, episode.raw);
    }
}
