use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::CaptionFormat;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p\b[^>]*>(.*?)</p>").expect("valid regex"));
static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Whether a fetched body really is in `format`, regardless of what was asked for
pub fn sniff(format: CaptionFormat, body: &str) -> bool {
    match format {
        CaptionFormat::Json3 => {
            let trimmed = body.trim();
            trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        }
        CaptionFormat::Srv3 => body.contains("<transcript"),
        CaptionFormat::Vtt => body.contains("-->"),
    }
}

/// Convert a body in `format` into plain text, one caption per line
pub fn to_text(format: CaptionFormat, body: &str) -> String {
    match format {
        CaptionFormat::Json3 => json3_to_text(body),
        CaptionFormat::Srv3 => srv3_to_text(body),
        CaptionFormat::Vtt => vtt_to_text(body),
    }
}

/// Sniff and normalize; `None` unless the body yields some text
pub fn parse_as(format: CaptionFormat, body: &str) -> Option<String> {
    if !sniff(format, body) {
        debug!("Body of {} bytes does not look like {format}", body.len());
        return None;
    }
    let text = to_text(format, body);
    (!text.is_empty()).then_some(text)
}

pub fn json3_to_text(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let doc: Json3Document = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Ignoring unparseable json3 body: {e}");
            return String::new();
        }
    };

    doc.events
        .iter()
        .filter_map(|event| event.segs.as_ref())
        .map(|segs| collapse(&segs.iter().map(|s| s.utf8.as_str()).collect::<String>()))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn vtt_to_text(raw: &str) -> String {
    let raw = raw.replace("\r\n", "\n");

    BLANK_LINE
        .split(&raw)
        .filter_map(|block| {
            let lines: Vec<&str> = block.lines().collect();
            let timing = lines.iter().position(|l| l.contains("-->"))?;
            let cue = lines[timing + 1..].join(" ");
            let line = collapse(&TAG.replace_all(&cue, ""));
            (!line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn srv3_to_text(raw: &str) -> String {
    if !PARAGRAPH.is_match(raw) {
        return transcript_xml_to_text(raw);
    }

    PARAGRAPH
        .captures_iter(raw)
        .filter_map(|caps| {
            let inner = LINE_BREAK.replace_all(&caps[1], "\n");
            let stripped = TAG.replace_all(&inner, "");
            let decoded = html_escape::decode_html_entities(&stripped);
            let line = collapse(&decoded);
            (!line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Legacy `<transcript><text start=".." dur="..">` documents, whose text is
/// frequently escaped twice
fn transcript_xml_to_text(xml: &str) -> String {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                current = Some(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                if let Some(buf) = current.take() {
                    let line = collapse(&html_escape::decode_html_entities(&buf));
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("Stopping at malformed transcript XML: {e}");
                break;
            }
            _ => {}
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json3_round_trip() {
        let body = r#"{"events":[{"segs":[{"utf8":"Hello"},{"utf8":" world"}]}]}"#;
        assert_eq!(json3_to_text(body), "Hello world");
    }

    #[test]
    fn test_json3_skips_events_without_text() {
        let body = r#"{"events":[
            {"tStartMs":0,"dDurationMs":10},
            {"segs":[{"utf8":"\n"}]},
            {"segs":[{"utf8":"first  "},{"utf8":"\tline"}]},
            {"segs":[{"acAsrConf":0}]},
            {"segs":[{"utf8":"second"}]}
        ]}"#;
        assert_eq!(json3_to_text(body), "first line\nsecond");
    }

    #[test]
    fn test_json3_empty_and_garbage() {
        assert_eq!(json3_to_text(""), "");
        assert_eq!(json3_to_text("<html>"), "");
    }

    #[test]
    fn test_vtt_basic() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:01.500 align:start\nHello   <c>world</c>\n\n2\n00:00:01.500 --> 00:00:03.000\nsecond\ncue\n";
        assert_eq!(vtt_to_text(vtt), "Hello world\nsecond cue");
    }

    #[test]
    fn test_vtt_skips_blocks_without_timing() {
        let vtt = "WEBVTT\n\nNOTE this is a comment\n\n00:00:00.000 --> 00:00:01.000\nkept\n";
        assert_eq!(vtt_to_text(vtt), "kept");
    }

    #[test]
    fn test_vtt_skips_whitespace_only_cues() {
        let vtt = "WEBVTT\r\n\r\n00:00:00.000 --> 00:00:01.000\r\n   \r\n\r\n00:00:01.000 --> 00:00:02.000\r\n<00:00:01.200><c> real</c>\r\n";
        assert_eq!(vtt_to_text(vtt), "real");
    }

    #[test]
    fn test_srv3_entities() {
        assert_eq!(srv3_to_text("<p>A &amp; B &lt;tag&gt;</p>"), "A & B <tag>");
    }

    #[test]
    fn test_srv3_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><timedtext format="3"><body>
<p t="0" d="1500"><s>Hello</s><s t="500"> there</s><br/>friend</p>
<p t="1500" d="10"> </p>
<p t="2000" d="1000">it&#39;s &quot;fine&quot;</p>
</body></timedtext>"#;
        assert_eq!(srv3_to_text(xml), "Hello there friend\nit's \"fine\"");
    }

    #[test]
    fn test_srv3_legacy_transcript() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript>
    <text start="0.21" dur="2.34">Hello world</text>
    <text start="2.55" dur="1.50">it&amp;#39;s a &amp;quot;test&amp;quot;</text>
    <text start="4.00" dur="1.00"></text>
</transcript>"#;
        assert_eq!(srv3_to_text(xml), "Hello world\nit's a \"test\"");
    }

    #[test]
    fn test_sniff() {
        assert!(sniff(CaptionFormat::Json3, "  {\"events\": []}\n"));
        assert!(!sniff(CaptionFormat::Json3, "{not json"));
        assert!(!sniff(CaptionFormat::Json3, "WEBVTT\n\n00:00 --> 00:01\nhi"));
        assert!(sniff(CaptionFormat::Srv3, "<?xml?><transcript></transcript>"));
        assert!(!sniff(CaptionFormat::Srv3, "<html></html>"));
        assert!(sniff(CaptionFormat::Vtt, "00:00 --> 00:01"));
        assert!(!sniff(CaptionFormat::Vtt, ""));
    }

    #[test]
    fn test_parse_as_rejects_mismatched_content() {
        let html = "<html><body>consent required</body></html>";
        assert_eq!(parse_as(CaptionFormat::Json3, html), None);
        assert_eq!(parse_as(CaptionFormat::Srv3, html), None);
        assert_eq!(parse_as(CaptionFormat::Vtt, html), None);
    }

    #[test]
    fn test_parse_as_rejects_empty_text() {
        assert_eq!(parse_as(CaptionFormat::Json3, r#"{"events":[]}"#), None);
        assert_eq!(
            parse_as(CaptionFormat::Json3, r#"{"events":[{"segs":[{"utf8":"ok"}]}]}"#),
            Some("ok".to_string())
        );
    }
}
