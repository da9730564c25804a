use eyre::Result;

use crate::service::CaptionsResponse;

/// Caption text only: manual if present, else auto, else the status message
pub fn render_text(response: &CaptionsResponse) -> String {
    match response.best() {
        Some(result) => result.text.clone(),
        None => response.message.clone(),
    }
}

/// The full response body, as the HTTP route would return it
pub fn render_json(response: &CaptionsResponse) -> Result<String> {
    Ok(serde_json::to_string_pretty(response)?)
}

/// One-paragraph summary for `--verbose`
pub fn render_summary(response: &CaptionsResponse) -> String {
    let source = match response.best() {
        Some(result) => format!(
            "{} ({})",
            result.format.map(|f| f.as_str()).unwrap_or("unknown"),
            result.language_code.as_deref().unwrap_or("?")
        ),
        None => "none".to_string(),
    };

    format!(
        "Video: {} ({})\nRegion: {}\nTracks: {} manual, {} auto\nSource: {source}\nStatus: {}",
        response.title.as_deref().unwrap_or("untitled"),
        response.video_id,
        response.meta.region,
        response.meta.manual_track_count,
        response.meta.auto_track_count,
        response.message,
    )
}
