use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::TrackKind;
use crate::fallback::{Extraction, SubtitleExtractor, SubtitleFile, ToolRun};
use crate::service::{CaptionService, ServiceSettings};
use crate::youtube::Endpoints;

pub const VIDEO_ID: &str = "dQw4w9WgXcQ";

pub const WATCH_HTML: &str = r#"<html><script>ytcfg.set({"INNERTUBE_API_KEY":"AIzaSyTestKey","INNERTUBE_CLIENT_VERSION":"2.20240101.00.00","INNERTUBE_CONTEXT":{"client":{"hl":"en","gl":"US","clientName":"WEB","clientVersion":"2.20240101.00.00","note":"{not a brace}"}}});</script></html>"#;

pub const JSON3: &str = r#"{"events":[{"segs":[{"utf8":"Hello"},{"utf8":" world"}]}]}"#;

pub const VTT: &str = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nfrom the tool\n";

pub fn player_json(status: &str, tracks: Value) -> Value {
    json!({
        "playabilityStatus": {"status": status, "reason": "because"},
        "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": tracks}},
        "videoDetails": {"title": "Test Video"}
    })
}

/// A track whose `baseUrl` points at the mock server's timed-text path
pub fn track_json(server: &MockServer, lang: &str, kind: Option<&str>) -> Value {
    let mut track = json!({
        "baseUrl": format!("{}/api/timedtext?v={VIDEO_ID}&lang={lang}", server.uri()),
        "languageCode": lang,
        "name": {"simpleText": format!("Language {lang}")}
    });
    if let Some(kind) = kind {
        track["kind"] = Value::from(kind);
    }
    track
}

/// Watch page plus player endpoint, for any region
pub async fn mount_player(server: &MockServer, player: Value) {
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WATCH_HTML))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/youtubei/v1/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(player))
        .mount(server)
        .await;
}

pub fn service(server: &MockServer, extractor: Arc<StubExtractor>) -> CaptionService {
    let settings = ServiceSettings {
        gl: "US".to_string(),
        regions: Vec::new(),
        request_timeout: Duration::from_secs(10),
        ..ServiceSettings::default()
    };
    CaptionService::new(
        reqwest::Client::new(),
        Endpoints::with_base(&server.uri()),
        settings,
        extractor,
    )
}

/// Hands out a canned VTT file for the listed modes and records every call
pub struct StubExtractor {
    serves: Vec<TrackKind>,
    calls: Mutex<Vec<TrackKind>>,
}

impl StubExtractor {
    pub fn serving(serves: &[TrackKind]) -> Self {
        Self {
            serves: serves.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TrackKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubtitleExtractor for StubExtractor {
    async fn extract(&self, _url: &str, lang: &str, mode: TrackKind) -> Extraction {
        self.calls.lock().unwrap().push(mode);
        let file = self.serves.contains(&mode).then(|| SubtitleFile {
            name: format!("{VIDEO_ID}.{lang}.vtt"),
            contents: VTT.to_string(),
        });
        let mut run = ToolRun::new(mode);
        run.exit_code = Some(if file.is_some() { 0 } else { 1 });
        Extraction { file, run }
    }
}
