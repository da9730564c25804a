use crate::TrackKind;
use crate::youtube::CaptionTrack;

/// Caption tracks split by kind, with the best pick for a language
#[derive(Debug, Clone, Default)]
pub struct TrackSelection<'a> {
    pub manual: Option<&'a CaptionTrack>,
    pub auto: Option<&'a CaptionTrack>,
    pub manual_tracks: Vec<&'a CaptionTrack>,
    pub auto_tracks: Vec<&'a CaptionTrack>,
}

pub fn select_tracks<'a>(tracks: &'a [CaptionTrack], lang: &str) -> TrackSelection<'a> {
    let (auto_tracks, manual_tracks): (Vec<_>, Vec<_>) =
        tracks.iter().partition(|t| t.kind() == TrackKind::Auto);

    TrackSelection {
        manual: best_match(&manual_tracks, lang),
        auto: best_match(&auto_tracks, lang),
        manual_tracks,
        auto_tracks,
    }
}

/// First track in the requested language, else the first track
fn best_match<'a>(tracks: &[&'a CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code.eq_ignore_ascii_case(lang))
        .or_else(|| tracks.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example.com/tt?lang={lang}"),
            language_code: lang.to_string(),
            name: None,
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_prefers_requested_language() {
        let tracks = vec![track("es", None), track("en", None)];
        let selection = select_tracks(&tracks, "en");
        assert_eq!(selection.manual.map(|t| t.language_code.as_str()), Some("en"));
        assert!(selection.auto.is_none());
    }

    #[test]
    fn test_language_match_is_case_insensitive() {
        let tracks = vec![track("pt", None), track("PT-br", None)];
        let selection = select_tracks(&tracks, "pt-BR");
        assert_eq!(selection.manual.map(|t| t.language_code.as_str()), Some("PT-br"));
    }

    #[test]
    fn test_falls_back_to_first_in_partition() {
        let tracks = vec![track("de", Some("asr")), track("fr", None), track("it", Some("asr"))];
        let selection = select_tracks(&tracks, "en");
        assert_eq!(selection.manual.map(|t| t.language_code.as_str()), Some("fr"));
        assert_eq!(selection.auto.map(|t| t.language_code.as_str()), Some("de"));
        assert_eq!(selection.manual_tracks.len(), 1);
        assert_eq!(selection.auto_tracks.len(), 2);
    }

    #[test]
    fn test_partitions_by_kind() {
        let tracks = vec![track("en", Some("asr")), track("en", None)];
        let selection = select_tracks(&tracks, "en");
        assert_eq!(selection.manual.and_then(|t| t.kind.as_deref()), None);
        assert_eq!(selection.auto.and_then(|t| t.kind.as_deref()), Some("asr"));
    }

    #[test]
    fn test_empty() {
        let selection = select_tracks(&[], "en");
        assert!(selection.manual.is_none());
        assert!(selection.auto.is_none());
        assert!(selection.manual_tracks.is_empty());
        assert!(selection.auto_tracks.is_empty());
    }
}
