use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::fallback::{self, FallbackReport, SubtitleExtractor, YtDlp};
use crate::fetch::{CaptionFetcher, FetchAttempt, HeaderPresets, TrackRequest};
use crate::tracks::select_tracks;
use crate::youtube::{self, CaptionTrack, Endpoints, RegionAttempt};
use crate::{CaptionError, CaptionFormat, CaptionResult, TrackKind, extract_video_id};

/// Public watch URL handed to the external extractor
const PUBLIC_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub const MSG_NO_CAPTIONS: &str = "No captions available for this video.";
pub const MSG_BLOCKED: &str = "Track found but caption download returned empty/blocked.";
pub const MSG_MANUAL: &str = "Manual captions retrieved.";
pub const MSG_AUTO: &str = "Auto-generated captions retrieved.";
pub const MSG_FALLBACK_SUFFIX: &str = " (via yt-dlp fallback)";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionsRequest {
    #[serde(default)]
    pub url: String,
    pub lang: Option<String>,
    pub hl: Option<String>,
    pub gl: Option<String>,
}

impl CaptionsRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub lang: String,
    pub name: String,
    pub kind: TrackKind,
}

impl From<&CaptionTrack> for TrackSummary {
    fn from(track: &CaptionTrack) -> Self {
        Self {
            lang: track.language_code.clone(),
            name: track.display_name(),
            kind: track.kind(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub no_captions: bool,
    pub manual_track_count: usize,
    pub auto_track_count: usize,
    pub available_tracks: Vec<TrackSummary>,
    pub playability_status: Option<String>,
    pub playability_reason: Option<String>,
    pub region: String,
    pub client_version: String,
    pub accepted: bool,
    pub region_attempts: Vec<RegionAttempt>,
    pub manual_fetch_log: Vec<FetchAttempt>,
    pub auto_fetch_log: Vec<FetchAttempt>,
    /// True when the returned text came from the external extractor
    pub used_fallback: bool,
    pub fallback: Option<FallbackReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionsResponse {
    pub video_id: String,
    pub lang: String,
    pub title: Option<String>,
    pub manual: CaptionResult,
    pub auto: CaptionResult,
    pub message: String,
    pub meta: ResponseMeta,
}

impl CaptionsResponse {
    pub fn no_captions(&self) -> bool {
        self.meta.no_captions
    }

    /// Manual text when there is any, else auto-generated
    pub fn best(&self) -> Option<&CaptionResult> {
        [&self.manual, &self.auto].into_iter().find(|r| !r.is_empty())
    }
}

/// Per-service defaults applied to every request
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub lang: String,
    pub hl: String,
    pub gl: String,
    pub regions: Vec<String>,
    pub request_timeout: Duration,
    pub fallback_enabled: bool,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lang: config.lang(),
            hl: config.hl(),
            gl: config.gl(),
            regions: config.regions(),
            request_timeout: config.request_timeout(),
            fallback_enabled: config.fallback_enabled(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives one caption request through metadata, selection, content fetch and fallback
pub struct CaptionService {
    client: reqwest::Client,
    endpoints: Endpoints,
    settings: ServiceSettings,
    presets: Option<HeaderPresets>,
    extractor: Arc<dyn SubtitleExtractor>,
}

impl CaptionService {
    pub fn new(
        client: reqwest::Client,
        endpoints: Endpoints,
        settings: ServiceSettings,
        extractor: Arc<dyn SubtitleExtractor>,
    ) -> Self {
        Self {
            client,
            endpoints,
            settings,
            presets: None,
            extractor,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CaptionError> {
        let client = reqwest::Client::builder().timeout(config.attempt_timeout()).build()?;
        let extractor = Arc::new(YtDlp::new(config.ytdlp_program(), config.ytdlp_timeout()));
        Ok(Self::new(
            client,
            Endpoints::default(),
            ServiceSettings::from_config(config),
            extractor,
        ))
    }

    /// Use fixed header variants instead of the per-request browser set
    pub fn with_presets(mut self, presets: HeaderPresets) -> Self {
        self.presets = Some(presets);
        self
    }

    pub async fn retrieve(&self, request: CaptionsRequest) -> Result<CaptionsResponse, CaptionError> {
        debug!("Resolving video id from {:?}", request.url);
        let video_id = extract_video_id(&request.url).ok_or(CaptionError::InvalidInput)?;

        let lang = or_default(request.lang, &self.settings.lang);
        let hl = or_default(request.hl, &self.settings.hl);
        let gl = or_default(request.gl, &self.settings.gl);

        let deadline = self.settings.request_timeout;
        match tokio::time::timeout(deadline, self.run(&video_id, &lang, &hl, &gl)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Caption request for {video_id} exceeded {deadline:?}");
                Err(CaptionError::DeadlineExceeded(deadline))
            }
        }
    }

    async fn run(&self, video_id: &str, lang: &str, hl: &str, gl: &str) -> Result<CaptionsResponse, CaptionError> {
        debug!("Fetching player metadata for {video_id} (lang={lang} hl={hl} gl={gl})");
        let regions = youtube::region_order(gl, &self.settings.regions);
        let lookup = youtube::fetch_player(&self.client, &self.endpoints, video_id, hl, &regions).await?;

        let tracks = lookup.player.caption_tracks();
        let selection = select_tracks(tracks, lang);
        debug!(
            "Selected tracks for {video_id}: manual={:?} auto={:?} ({} total)",
            selection.manual.map(|t| &t.language_code),
            selection.auto.map(|t| &t.language_code),
            tracks.len()
        );

        let watch_url = self.endpoints.watch_url(video_id, hl, &lookup.region);
        let presets = match &self.presets {
            Some(presets) => presets.clone(),
            None => HeaderPresets::browser(hl, &watch_url, &self.endpoints.web_base),
        };
        let fetcher = CaptionFetcher::new(&self.client, &self.endpoints, &presets);

        debug!("Fetching caption content for {video_id}");
        let (manual, manual_fetch_log) = fetch_track(&fetcher, selection.manual, video_id).await;
        let (auto, auto_fetch_log) = fetch_track(&fetcher, selection.auto, video_id).await;

        let needs_fallback = manual.is_empty() && auto.is_empty() && !tracks.is_empty();
        let (manual, auto, fallback) = if needs_fallback && self.settings.fallback_enabled {
            debug!("Native fetch came back empty for {video_id}; trying external extraction");
            let url = format!("{PUBLIC_WATCH_URL}{video_id}");
            let report = fallback::run_fallback(self.extractor.as_ref(), &url, lang).await;
            let (manual, auto) = apply_fallback(manual, auto, &report, lang);
            (manual, auto, Some(report))
        } else {
            if needs_fallback {
                debug!("External extraction disabled; leaving {video_id} empty");
            }
            (manual, auto, None)
        };

        let used_fallback = fallback.as_ref().is_some_and(|r| !r.text.is_empty());
        let no_captions = manual.is_empty() && auto.is_empty();
        let message = status_message(&manual, &auto, tracks.len(), used_fallback);
        info!("{video_id}: {message}");

        Ok(CaptionsResponse {
            video_id: video_id.to_string(),
            lang: lang.to_string(),
            title: lookup.player.title().map(str::to_string),
            message,
            meta: ResponseMeta {
                no_captions,
                manual_track_count: selection.manual_tracks.len(),
                auto_track_count: selection.auto_tracks.len(),
                available_tracks: tracks.iter().map(TrackSummary::from).collect(),
                playability_status: lookup.player.status().map(str::to_string),
                playability_reason: lookup.player.reason().map(str::to_string),
                region: lookup.region.clone(),
                client_version: lookup.client_version.clone(),
                accepted: lookup.accepted,
                region_attempts: lookup.attempts.clone(),
                manual_fetch_log,
                auto_fetch_log,
                used_fallback,
                fallback,
            },
            manual,
            auto,
        })
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn fetch_track(
    fetcher: &CaptionFetcher<'_>,
    track: Option<&CaptionTrack>,
    video_id: &str,
) -> (CaptionResult, Vec<FetchAttempt>) {
    let Some(track) = track else {
        return (CaptionResult::empty(), Vec::new());
    };

    let request = TrackRequest {
        base_url: &track.base_url,
        video_id,
        lang: &track.language_code,
        kind: track.kind(),
    };
    let outcome = fetcher.fetch(&request).await;

    let mut result = CaptionResult {
        language_code: Some(track.language_code.clone()),
        name: Some(track.display_name()),
        ..CaptionResult::default()
    };
    if let Some(fetched) = outcome.fetched {
        result.format = Some(fetched.format);
        result.text = fetched.text;
        result.source_url = Some(fetched.url);
    }

    (result, outcome.log)
}

/// Replace the category the extractor recovered; the other stays as fetched
fn apply_fallback(
    manual: CaptionResult,
    auto: CaptionResult,
    report: &FallbackReport,
    lang: &str,
) -> (CaptionResult, CaptionResult) {
    if report.text.is_empty() {
        return (manual, auto);
    }

    let recovered = CaptionResult {
        language_code: Some(lang.to_string()),
        name: None,
        format: Some(CaptionFormat::Vtt),
        text: report.text.clone(),
        source_url: report.file.as_ref().map(|f| format!("yt-dlp:{f}")),
    };

    match report.kind {
        Some(TrackKind::Manual) => (recovered, auto),
        Some(TrackKind::Auto) => (manual, recovered),
        None => (manual, auto),
    }
}

fn status_message(manual: &CaptionResult, auto: &CaptionResult, track_count: usize, used_fallback: bool) -> String {
    let base = if !manual.is_empty() {
        MSG_MANUAL
    } else if !auto.is_empty() {
        MSG_AUTO
    } else if track_count > 0 {
        MSG_BLOCKED
    } else {
        MSG_NO_CAPTIONS
    };

    if used_fallback {
        format!("{base}{MSG_FALLBACK_SUFFIX}")
    } else {
        base.to_string()
    }
}
