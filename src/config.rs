use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::youtube::FALLBACK_REGIONS;

/// Overrides the configured `ytdlp_path`
pub const YTDLP_ENV: &str = "YT_DLP_PATH";

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_HL: &str = "en";
pub const DEFAULT_GL: &str = "IN";

const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
const DEFAULT_YTDLP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bind: Option<String>,
    pub default_lang: Option<String>,
    pub default_hl: Option<String>,
    pub default_gl: Option<String>,
    pub fallback_regions: Option<Vec<String>>,
    pub ytdlp_path: Option<PathBuf>,
    pub fallback_enabled: Option<bool>,
    pub attempt_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub ytdlp_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config from ~/.config/ytcaps/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn bind(&self) -> String {
        self.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn lang(&self) -> String {
        self.default_lang.clone().unwrap_or_else(|| DEFAULT_LANG.to_string())
    }

    pub fn hl(&self) -> String {
        self.default_hl.clone().unwrap_or_else(|| DEFAULT_HL.to_string())
    }

    pub fn gl(&self) -> String {
        self.default_gl.clone().unwrap_or_else(|| DEFAULT_GL.to_string())
    }

    pub fn regions(&self) -> Vec<String> {
        self.fallback_regions
            .clone()
            .unwrap_or_else(|| FALLBACK_REGIONS.iter().map(|s| s.to_string()).collect())
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled.unwrap_or(true)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs.unwrap_or(DEFAULT_YTDLP_TIMEOUT_SECS))
    }

    /// `$YT_DLP_PATH`, then `ytdlp_path`, then `yt-dlp` on PATH
    pub fn ytdlp_program(&self) -> PathBuf {
        resolve_ytdlp(std::env::var(YTDLP_ENV).ok(), self.ytdlp_path.clone())
    }
}

fn resolve_ytdlp(from_env: Option<String>, configured: Option<PathBuf>) -> PathBuf {
    from_env
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or(configured)
        .unwrap_or_else(|| PathBuf::from("yt-dlp"))
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytcaps")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
bind = "0.0.0.0:9000"
default_lang = "es"
default_hl = "es"
default_gl = "MX"
fallback_regions = ["US", "ES"]
ytdlp_path = "/opt/bin/yt-dlp"
fallback_enabled = false
attempt_timeout_secs = 5
request_timeout_secs = 30
ytdlp_timeout_secs = 60
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind(), "0.0.0.0:9000");
        assert_eq!(config.lang(), "es");
        assert_eq!(config.hl(), "es");
        assert_eq!(config.gl(), "MX");
        assert_eq!(config.regions(), vec!["US", "ES"]);
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/bin/yt-dlp")));
        assert!(!config.fallback_enabled());
        assert_eq!(config.attempt_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.ytdlp_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bind(), DEFAULT_BIND);
        assert_eq!(config.lang(), "en");
        assert_eq!(config.gl(), "IN");
        assert_eq!(config.regions(), vec!["US", "GB", "IN", "CA", "AU"]);
        assert!(config.fallback_enabled());
        assert_eq!(config.request_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"default_lang = "fr""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_lang.as_deref(), Some("fr"));
        assert!(config.default_gl.is_none());
    }

    #[test]
    fn test_resolve_ytdlp() {
        let configured = Some(PathBuf::from("/opt/yt-dlp"));
        assert_eq!(resolve_ytdlp(Some("/env/yt-dlp".into()), configured.clone()), PathBuf::from("/env/yt-dlp"));
        assert_eq!(resolve_ytdlp(Some("  ".into()), configured.clone()), PathBuf::from("/opt/yt-dlp"));
        assert_eq!(resolve_ytdlp(None, configured), PathBuf::from("/opt/yt-dlp"));
        assert_eq!(resolve_ytdlp(None, None), PathBuf::from("yt-dlp"));
    }
}
