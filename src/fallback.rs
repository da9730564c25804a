use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{TrackKind, normalize};

const SUBTITLE_EXTENSIONS: &[&str] = &["vtt", "srt"];

/// Keep only the end of the tool's output in diagnostics
const OUTPUT_TAIL_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleFile {
    pub name: String,
    pub contents: String,
}

/// Diagnostics for one invocation of the extraction tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRun {
    pub mode: TrackKind,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub file: Option<String>,
    pub error: Option<String>,
}

impl ToolRun {
    pub fn new(mode: TrackKind) -> Self {
        Self {
            mode,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            file: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub file: Option<SubtitleFile>,
    pub run: ToolRun,
}

/// Something that can pull a subtitle file for a video without our HTTP paths
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    async fn extract(&self, url: &str, lang: &str, mode: TrackKind) -> Extraction;
}

/// `yt-dlp`, run once per call in its own temporary directory
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

pub fn ytdlp_args(url: &str, lang: &str, mode: TrackKind, output_template: &str) -> Vec<String> {
    let write_flag = match mode {
        TrackKind::Manual => "--write-subs",
        TrackKind::Auto => "--write-auto-subs",
    };

    vec![
        "--skip-download".to_string(),
        write_flag.to_string(),
        "--sub-langs".to_string(),
        format!("{lang},{lang}.*"),
        "--sub-format".to_string(),
        "vtt".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "-o".to_string(),
        output_template.to_string(),
        url.to_string(),
    ]
}

#[async_trait]
impl SubtitleExtractor for YtDlp {
    async fn extract(&self, url: &str, lang: &str, mode: TrackKind) -> Extraction {
        let mut run = ToolRun::new(mode);

        let workdir = match tempfile::Builder::new().prefix("ytcaps-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                run.error = Some(format!("failed to create temp dir: {e}"));
                return Extraction { file: None, run };
            }
        };
        let template = workdir.path().join("%(id)s.%(ext)s");

        debug!("Running {} for {mode} subtitles of {url}", self.program.display());

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(ytdlp_args(url, lang, mode, &template.to_string_lossy()))
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                run.exit_code = output.status.code();
                run.stdout = tail(&String::from_utf8_lossy(&output.stdout));
                run.stderr = tail(&String::from_utf8_lossy(&output.stderr));
                if !output.status.success() {
                    warn!("yt-dlp exited with status {} for {mode} subtitles", output.status);
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                run.error = Some(format!(
                    "{} not found. Install it to enable the subtitle fallback:\n  \
                     pip install yt-dlp\n  \
                     or: brew install yt-dlp",
                    self.program.display()
                ));
            }
            Ok(Err(e)) => run.error = Some(format!("failed to run yt-dlp: {e}")),
            Err(_) => run.error = Some(format!("yt-dlp timed out after {:?}", self.timeout)),
        }

        if let Some(err) = &run.error {
            warn!("Subtitle fallback ({mode}): {err}");
        }

        // A failing exit status doesn't rule out a written file
        let file = match find_subtitle_file(workdir.path(), lang) {
            Some(path) => match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Some(SubtitleFile {
                    name: file_name(&path),
                    contents,
                }),
                Err(e) => {
                    run.error = Some(format!("failed to read {}: {e}", path.display()));
                    None
                }
            },
            None => None,
        };
        run.file = file.as_ref().map(|f| f.name.clone());

        Extraction { file, run }
    }
}

/// A subtitle file in `dir`, preferring one whose name mentions `lang`
pub fn find_subtitle_file(dir: &Path, lang: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SUBTITLE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        })
        .collect();
    candidates.sort();

    let preferred = candidates
        .iter()
        .find(|path| names_language(&file_name(path), lang))
        .cloned();

    preferred.or_else(|| candidates.into_iter().next())
}

/// `ID.en.vtt` or `ID.en-US.vtt`; the video id itself may contain the code
fn names_language(file_name: &str, lang: &str) -> bool {
    let name = file_name.to_ascii_lowercase();
    let lang = lang.to_ascii_lowercase();
    name.contains(&format!(".{lang}.")) || name.contains(&format!(".{lang}-"))
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().to_string()
}

fn tail(s: &str) -> String {
    let s = s.trim();
    let count = s.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return s.to_string();
    }
    s.chars().skip(count - OUTPUT_TAIL_CHARS).collect()
}

/// What the external tool recovered, if anything
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackReport {
    pub kind: Option<TrackKind>,
    pub file: Option<String>,
    #[serde(skip)]
    pub text: String,
    pub message: String,
    pub runs: Vec<ToolRun>,
}

/// Manual subtitles first; auto-generated only if that produced no file
pub async fn run_fallback(extractor: &dyn SubtitleExtractor, url: &str, lang: &str) -> FallbackReport {
    let mut runs = Vec::new();

    for mode in [TrackKind::Manual, TrackKind::Auto] {
        let Extraction { file, run } = extractor.extract(url, lang, mode).await;
        runs.push(run);

        if let Some(file) = file {
            let text = normalize::vtt_to_text(&file.contents);
            info!("Fallback produced {mode} subtitles {} ({} chars)", file.name, text.len());
            let message = if text.is_empty() {
                format!("{} contained no caption text", file.name)
            } else {
                format!("Recovered {mode} subtitles from {}", file.name)
            };
            return FallbackReport {
                kind: Some(mode),
                file: Some(file.name),
                text,
                message,
                runs,
            };
        }
    }

    warn!("Fallback produced no subtitle file for {url}");
    FallbackReport {
        kind: None,
        file: None,
        text: String::new(),
        message: "yt-dlp produced no subtitle file".to_string(),
        runs,
    }
}
