use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("marker {0:?} not found")]
    MarkerNotFound(String),

    #[error("no opening brace after marker")]
    NoOpeningBrace,

    #[error("embedded object is unbalanced or not valid JSON")]
    UnbalancedOrInvalidJson,
}

/// Parse the first balanced `{...}` object that follows `marker` in `text`.
///
/// Watch pages embed client configuration as object literals in `<script>`
/// blocks; the end of the object is found by tracking brace depth and string
/// state, since nested objects and braces inside strings defeat a regex.
pub fn extract_json_after(text: &str, marker: &str) -> Result<Value, ExtractError> {
    let marker_at = text
        .find(marker)
        .ok_or_else(|| ExtractError::MarkerNotFound(marker.to_string()))?;
    let open = text[marker_at..]
        .find('{')
        .map(|i| marker_at + i)
        .ok_or(ExtractError::NoOpeningBrace)?;

    let close = balanced_end(&text.as_bytes()[open..])
        .map(|i| open + i)
        .ok_or(ExtractError::UnbalancedOrInvalidJson)?;

    serde_json::from_str(&text[open..=close]).map_err(|_| ExtractError::UnbalancedOrInvalidJson)
}

/// Index of the brace closing the object that starts at `bytes[0]`.
///
/// Structural characters are all ASCII, so scanning bytes never lands inside
/// a multi-byte UTF-8 sequence.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
