use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use url::{Url, form_urlencoded};

use crate::attempt::{self, Tried};
use crate::normalize;
use crate::youtube::{Endpoints, USER_AGENT, accept_language};
use crate::{CaptionFormat, TrackKind};

/// How much of each attempted URL goes into the log
pub const URL_PREFIX_LEN: usize = 120;

static FMT_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([?&])fmt=[^&#]*").expect("valid regex"));

/// One set of request headers to try against a caption endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderVariant {
    pub label: String,
    pub headers: Vec<(String, String)>,
}

impl HeaderVariant {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Ordered header variants for the track's own URL and for the direct endpoint
#[derive(Debug, Clone)]
pub struct HeaderPresets {
    pub native: Vec<HeaderVariant>,
    pub direct: Vec<HeaderVariant>,
}

impl HeaderPresets {
    pub fn browser(hl: &str, referer: &str, origin: &str) -> Self {
        let full = HeaderVariant::new("browser")
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json, text/xml, text/vtt, */*;q=0.8")
            .header("Accept-Language", accept_language(hl))
            .header("Referer", referer)
            .header("Origin", origin);
        let identity = HeaderVariant::new("identity")
            .header("User-Agent", USER_AGENT)
            .header("Accept", "*/*")
            .header("Accept-Encoding", "identity")
            .header("Referer", referer);
        let minimal = HeaderVariant::new("minimal").header("User-Agent", USER_AGENT);

        Self {
            native: vec![full.clone(), identity, minimal.clone()],
            direct: vec![full, minimal],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// The track's own `baseUrl`
    Native,
    /// The timed-text endpoint addressed by video id and language
    Direct,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Native => write!(f, "native"),
            Phase::Direct => write!(f, "direct"),
        }
    }
}

/// One HTTP attempt in the content fetch log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAttempt {
    pub phase: Phase,
    pub format: CaptionFormat,
    pub url: String,
    pub variant: usize,
    pub status: Option<u16>,
    pub bytes: usize,
    pub error: Option<String>,
}

/// Caption text that survived sniffing and normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub format: CaptionFormat,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub fetched: Option<Fetched>,
    pub log: Vec<FetchAttempt>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackRequest<'a> {
    pub base_url: &'a str,
    pub video_id: &'a str,
    pub lang: &'a str,
    pub kind: TrackKind,
}

pub struct CaptionFetcher<'a> {
    client: &'a reqwest::Client,
    timedtext_url: &'a str,
    presets: &'a HeaderPresets,
}

impl<'a> CaptionFetcher<'a> {
    pub fn new(client: &'a reqwest::Client, endpoints: &'a Endpoints, presets: &'a HeaderPresets) -> Self {
        Self {
            client,
            timedtext_url: &endpoints.timedtext_url,
            presets,
        }
    }

    /// Try every format against the track URL, then against the direct
    /// endpoint. Never fails; `fetched` is `None` when nothing usable came back.
    pub async fn fetch(&self, track: &TrackRequest<'_>) -> FetchOutcome {
        let mut log = Vec::new();

        let native = if track.base_url.is_empty() {
            debug!("Track {} has no base URL; skipping native phase", track.lang);
            None
        } else {
            self.try_formats(&mut log, Phase::Native, &self.presets.native, |format| {
                with_format(track.base_url, format)
            })
            .await
        };

        let fetched = match native {
            Some(fetched) => Some(fetched),
            None => {
                self.try_formats(&mut log, Phase::Direct, &self.presets.direct, |format| {
                    direct_url(self.timedtext_url, track, format)
                })
                .await
            }
        };

        match &fetched {
            Some(f) => info!(
                "Fetched {} {} captions for {} as {} ({} attempts)",
                track.kind,
                track.lang,
                track.video_id,
                f.format,
                log.len()
            ),
            None => info!(
                "No usable {} {} captions for {} after {} attempts",
                track.kind,
                track.lang,
                track.video_id,
                log.len()
            ),
        }

        FetchOutcome { fetched, log }
    }

    async fn try_formats<F>(
        &self,
        log: &mut Vec<FetchAttempt>,
        phase: Phase,
        variants: &[HeaderVariant],
        url_for: F,
    ) -> Option<Fetched>
    where
        F: Fn(CaptionFormat) -> String,
    {
        let client = self.client;

        attempt::first_success(log, CaptionFormat::PRIORITY, move |format| {
            let url = url_for(format);
            async move {
                let mut entries = Vec::new();
                let body = fetch_first_nonempty(client, &mut entries, phase, format, &url, variants).await;
                match body.and_then(|b| normalize::parse_as(format, &b)) {
                    Some(text) => Tried::accept(Fetched { format, text, url }, entries),
                    None => Tried::skip(entries),
                }
            }
        })
        .await
        .accepted()
    }
}

/// First 2xx response with a non-empty body across the header variants.
///
/// A 200 with zero bytes is how blocked requests usually look, so it is
/// logged and passed over like any other failure.
async fn fetch_first_nonempty(
    client: &reqwest::Client,
    log: &mut Vec<FetchAttempt>,
    phase: Phase,
    format: CaptionFormat,
    url: &str,
    variants: &[HeaderVariant],
) -> Option<String> {
    attempt::first_success(log, variants.iter().enumerate(), move |(index, variant)| async move {
        let mut entry = FetchAttempt {
            phase,
            format,
            url: url_prefix(url),
            variant: index,
            status: None,
            bytes: 0,
            error: None,
        };

        let mut request = client.get(url);
        for (name, value) in &variant.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("{phase} {format} variant {index} ({}) failed: {e}", variant.label);
                entry.error = Some(e.to_string());
                return Tried::skip(vec![entry]);
            }
        };

        let status = response.status();
        entry.status = Some(status.as_u16());

        match response.bytes().await {
            Ok(body) => {
                entry.bytes = body.len();
                debug!(
                    "{phase} {format} variant {index} ({}): HTTP {status}, {} bytes",
                    variant.label,
                    body.len()
                );
                if status.is_success() && !body.is_empty() {
                    Tried::accept(String::from_utf8_lossy(&body).into_owned(), vec![entry])
                } else {
                    Tried::skip(vec![entry])
                }
            }
            Err(e) => {
                entry.error = Some(e.to_string());
                Tried::skip(vec![entry])
            }
        }
    })
    .await
    .accepted()
}

/// Set or overwrite the `fmt` query parameter
pub fn with_format(base_url: &str, format: CaptionFormat) -> String {
    match Url::parse(base_url) {
        Ok(mut url) => {
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| *k != "fmt")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("fmt", format.as_str());
            url.into()
        }
        Err(_) if FMT_PARAM.is_match(base_url) => FMT_PARAM
            .replace(base_url, format!("${{1}}fmt={format}"))
            .into_owned(),
        Err(_) => {
            let sep = if base_url.contains('?') { '&' } else { '?' };
            format!("{base_url}{sep}fmt={format}")
        }
    }
}

fn direct_url(timedtext_url: &str, track: &TrackRequest<'_>, format: CaptionFormat) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("v", track.video_id).append_pair("lang", track.lang);
    if track.kind == TrackKind::Auto {
        query.append_pair("kind", "asr");
    }
    query.append_pair("fmt", format.as_str());
    format!("{timedtext_url}?{}", query.finish())
}

fn url_prefix(url: &str) -> String {
    url.chars().take(URL_PREFIX_LEN).collect()
}
