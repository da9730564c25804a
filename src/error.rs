use std::time::Duration;

use thiserror::Error;

use crate::embedded::ExtractError;

/// Failures that abort a caption request.
///
/// Missing or empty captions are not errors; they come back as empty results.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Invalid YouTube URL or video id")]
    InvalidInput,

    #[error("could not extract player configuration from watch page")]
    NoApiConfig,

    #[error("all regions failed: {0}")]
    AllRegionsFailed(String),

    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedded config: {0}")]
    Extract(#[from] ExtractError),
}
