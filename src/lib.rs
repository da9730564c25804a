pub mod attempt;
pub mod config;
pub mod embedded;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod server;
pub mod service;
pub mod tracks;
pub mod youtube;

#[cfg(test)]
mod test_support;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub use error::CaptionError;

/// Hosts whose first path segment is the video id
const SHORT_LINK_HOSTS: &[&str] = &["youtu.be"];

const VIDEO_ID_LEN: usize = 11;

static BARE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex"));

/// Subtitle payload encoding, in fetch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    Json3,
    Srv3,
    Vtt,
}

impl CaptionFormat {
    pub const PRIORITY: [CaptionFormat; 3] = [CaptionFormat::Json3, CaptionFormat::Srv3, CaptionFormat::Vtt];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionFormat::Json3 => "json3",
            CaptionFormat::Srv3 => "srv3",
            CaptionFormat::Vtt => "vtt",
        }
    }
}

impl std::fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a caption stream was authored by a human or produced by ASR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Manual,
    Auto,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Manual => write!(f, "manual"),
            TrackKind::Auto => write!(f, "auto"),
        }
    }
}

/// Final caption outcome for one track category.
///
/// An empty `text` with `format: None` means nothing usable was retrieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptionResult {
    #[serde(rename = "lang")]
    pub language_code: Option<String>,
    pub name: Option<String>,
    pub format: Option<CaptionFormat>,
    pub text: String,
    #[serde(rename = "url")]
    pub source_url: Option<String>,
}

impl CaptionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Extract a video ID from a bare ID or one of the supported URL shapes
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if BARE_VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    // youtu.be/ID
    if SHORT_LINK_HOSTS.iter().any(|h| host.contains(h)) {
        return url
            .path_segments()?
            .find(|s| !s.is_empty())
            .filter(|s| is_id_shaped(s))
            .map(str::to_string);
    }

    // youtube.com/watch?v=ID
    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        if is_id_shaped(&v) {
            return Some(v.into_owned());
        }
    }

    // youtube.com/shorts/ID, youtube.com/embed/ID
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .find(|pair| pair[0] == "shorts" || pair[0] == "embed")
        .map(|pair| pair[1])
        .filter(|s| is_id_shaped(s))
        .map(str::to_string)
}

fn is_id_shaped(s: &str) -> bool {
    s.chars().count() == VIDEO_ID_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_url_wrong_length() {
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_shorts_url() {
        assert_eq!(
            extract_video_id("https://m.youtube.com/shorts/dQw4w9WgXcQ/"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_v_param_falls_through_to_path() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?v=abc"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(extract_video_id("not-a-valid-id"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/UCabc"), None);
    }

    #[test]
    fn test_schemeless_url_fails_closed() {
        assert_eq!(extract_video_id("youtube.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(extract_video_id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_resolution_is_stable() {
        let inputs = ["https://youtu.be/dQw4w9WgXcQ", "garbage", "dQw4w9WgXcQ"];
        for input in inputs {
            assert_eq!(extract_video_id(input), extract_video_id(input));
        }
    }

    #[test]
    fn test_caption_format_priority() {
        let names: Vec<_> = CaptionFormat::PRIORITY.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, ["json3", "srv3", "vtt"]);
    }
}
