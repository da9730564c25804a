use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::form_urlencoded;

use crate::attempt::{self, Settled, Tried};
use crate::embedded::extract_json_after;
use crate::{CaptionError, TrackKind};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Regions tried after the caller's preferred one
pub const FALLBACK_REGIONS: &[&str] = &["US", "GB", "IN", "CA", "AU"];

/// `kind` value carried by auto-generated tracks
const AUTO_KIND: &str = "asr";

const CONTEXT_MARKER: &str = r#""INNERTUBE_CONTEXT""#;

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("valid regex"));
static API_KEY_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).expect("valid regex"));
static CLIENT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_CLIENT_VERSION"\s*:\s*"([^"]+)""#).expect("valid regex"));

/// Upstream roots; overridable so tests can point at a local server
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub web_base: String,
    pub timedtext_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_base("https://www.youtube.com")
    }
}

impl Endpoints {
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            web_base: base.to_string(),
            timedtext_url: format!("{base}/api/timedtext"),
        }
    }

    pub fn watch_url(&self, video_id: &str, hl: &str, gl: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("v", video_id)
            .append_pair("hl", hl)
            .append_pair("gl", gl)
            .append_pair("persist_hl", "1")
            .append_pair("persist_gl", "1")
            .finish();
        format!("{}/watch?{query}", self.web_base)
    }

    fn player_url(&self, api_key: &str) -> String {
        format!("{}/youtubei/v1/player?key={api_key}&prettyPrint=false", self.web_base)
    }
}

/// Client configuration scraped from a watch page; valid for one request only
#[derive(Debug, Clone)]
pub struct PlayerContext {
    pub api_key: String,
    pub client_version: String,
    pub context: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    pub playability_status: Option<PlayabilityStatus>,
    pub captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    pub video_details: Option<VideoDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayabilityStatus {
    pub status: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoDetails {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks", default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,
    #[serde(rename = "languageCode", default)]
    pub language_code: String,
    pub name: Option<TrackName>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackName {
    #[serde(rename = "simpleText")]
    pub simple_text: Option<String>,
    #[serde(default)]
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub text: String,
}

impl CaptionTrack {
    pub fn kind(&self) -> TrackKind {
        if self.kind.as_deref() == Some(AUTO_KIND) {
            TrackKind::Auto
        } else {
            TrackKind::Manual
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(TrackName {
                simple_text: Some(text), ..
            }) => text.clone(),
            Some(name) => name.runs.iter().map(|r| r.text.as_str()).collect(),
            None => self.language_code.clone(),
        }
    }
}

impl PlayerResponse {
    pub fn caption_tracks(&self) -> &[CaptionTrack] {
        self.captions
            .as_ref()
            .and_then(|c| c.player_captions_tracklist_renderer.as_ref())
            .map(|r| r.caption_tracks.as_slice())
            .unwrap_or_default()
    }

    pub fn status(&self) -> Option<&str> {
        self.playability_status.as_ref()?.status.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.playability_status.as_ref()?.reason.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.video_details.as_ref()?.title.as_deref()
    }

    pub fn is_unplayable(&self) -> bool {
        self.status().is_some_and(|s| s.eq_ignore_ascii_case("UNPLAYABLE"))
    }

    /// Unplayable responses still count when they expose caption tracks;
    /// some consent/region variants report UNPLAYABLE alongside a full track list.
    pub fn is_acceptable(&self) -> bool {
        !self.is_unplayable() || !self.caption_tracks().is_empty()
    }
}

/// One region's entry in the metadata attempt log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAttempt {
    pub gl: String,
    pub playability_status: Option<String>,
    pub reason: Option<String>,
    pub track_count: usize,
    pub accepted: bool,
    pub error: Option<String>,
}

impl RegionAttempt {
    fn parsed(gl: &str, player: &PlayerResponse, accepted: bool) -> Self {
        Self {
            gl: gl.to_string(),
            playability_status: player.status().map(str::to_string),
            reason: player.reason().map(str::to_string),
            track_count: player.caption_tracks().len(),
            accepted,
            error: None,
        }
    }

    fn failed(gl: &str, err: &CaptionError) -> Self {
        Self {
            gl: gl.to_string(),
            playability_status: None,
            reason: None,
            track_count: 0,
            accepted: false,
            error: Some(err.to_string()),
        }
    }
}

/// Player data together with how it was obtained
#[derive(Debug, Clone)]
pub struct PlayerLookup {
    pub player: PlayerResponse,
    pub region: String,
    pub client_version: String,
    /// False when no region passed the acceptance rule and this is the last parsed response
    pub accepted: bool,
    pub attempts: Vec<RegionAttempt>,
}

struct RegionHit {
    player: PlayerResponse,
    region: String,
    client_version: String,
}

/// Preferred region first, then the fallbacks, without duplicates
pub fn region_order<S: AsRef<str>>(preferred: &str, fallbacks: &[S]) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for gl in std::iter::once(preferred).chain(fallbacks.iter().map(AsRef::as_ref)) {
        let gl = gl.trim().to_ascii_uppercase();
        if !gl.is_empty() && !regions.contains(&gl) {
            regions.push(gl);
        }
    }
    regions
}

/// Resolve player data for a video, trying each region in order
pub async fn fetch_player(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    video_id: &str,
    hl: &str,
    regions: &[String],
) -> Result<PlayerLookup, CaptionError> {
    let mut attempts = Vec::new();

    let settled = attempt::first_success(&mut attempts, regions, move |gl| async move {
        match fetch_region(client, endpoints, video_id, hl, gl).await {
            Ok(hit) => {
                let accepted = hit.player.is_acceptable();
                let entry = RegionAttempt::parsed(gl, &hit.player, accepted);
                debug!(
                    "Region {gl}: status={:?} tracks={}",
                    hit.player.status(),
                    hit.player.caption_tracks().len()
                );
                if !accepted {
                    return Tried::keep(hit, vec![entry]);
                }
                if hit.player.is_unplayable() {
                    warn!("Accepting UNPLAYABLE response for {video_id} in {gl} because it lists caption tracks");
                }
                Tried::accept(hit, vec![entry])
            }
            Err(e) => {
                warn!("Region {gl} failed for {video_id}: {e}");
                Tried::skip(vec![RegionAttempt::failed(gl, &e)])
            }
        }
    })
    .await;

    let (hit, accepted) = match settled {
        Settled::Accepted(hit) => (hit, true),
        Settled::Fallback(hit) => {
            warn!("No region accepted for {video_id}; using last parsed response from {}", hit.region);
            (hit, false)
        }
        Settled::Exhausted => {
            let last = attempts
                .last()
                .and_then(|a| a.error.clone())
                .unwrap_or_else(|| "no regions to try".to_string());
            return Err(CaptionError::AllRegionsFailed(last));
        }
    };

    info!(
        "Player data for {video_id} from region {} ({} tracks)",
        hit.region,
        hit.player.caption_tracks().len()
    );

    Ok(PlayerLookup {
        player: hit.player,
        region: hit.region,
        client_version: hit.client_version,
        accepted,
        attempts,
    })
}

async fn fetch_region(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    video_id: &str,
    hl: &str,
    gl: &str,
) -> Result<RegionHit, CaptionError> {
    let watch_url = endpoints.watch_url(video_id, hl, gl);
    debug!("Fetching watch page: {watch_url}");

    let page_html = client
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .header("Accept-Language", accept_language(hl))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let ctx = extract_player_context(&page_html)?;
    debug!("Extracted InnerTube config for {gl}: client version {}", ctx.client_version);

    let body = player_request_body(&ctx, video_id, hl, gl);

    let player: PlayerResponse = client
        .post(endpoints.player_url(&ctx.api_key))
        .header("User-Agent", USER_AGENT)
        .header("Content-Type", "application/json")
        .header("Accept-Language", accept_language(hl))
        .header("Origin", &endpoints.web_base)
        .header("Referer", &watch_url)
        .header("X-YouTube-Client-Name", "1")
        .header("X-YouTube-Client-Version", &ctx.client_version)
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(RegionHit {
        player,
        region: gl.to_string(),
        client_version: ctx.client_version,
    })
}

pub fn accept_language(hl: &str) -> String {
    format!("{hl},en;q=0.9")
}

/// Pull the API key, client version and client context out of a watch page
pub fn extract_player_context(html: &str) -> Result<PlayerContext, CaptionError> {
    let api_key = capture(&API_KEY, html).or_else(|| capture(&API_KEY_ALT, html));
    let client_version = capture(&CLIENT_VERSION, html);

    let (Some(api_key), Some(client_version)) = (api_key, client_version) else {
        return Err(CaptionError::NoApiConfig);
    };

    let context = extract_json_after(html, CONTEXT_MARKER)?;

    Ok(PlayerContext {
        api_key,
        client_version,
        context,
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].to_string())
}

fn player_request_body(ctx: &PlayerContext, video_id: &str, hl: &str, gl: &str) -> Value {
    let mut context = ctx.context.clone();
    if let Some(client) = context.get_mut("client").and_then(Value::as_object_mut) {
        client.insert("hl".to_string(), Value::from(hl));
        client.insert("gl".to_string(), Value::from(gl));
    }

    json!({
        "context": context,
        "videoId": video_id,
        "contentCheckOk": true,
        "racyCheckOk": true
    })
}
