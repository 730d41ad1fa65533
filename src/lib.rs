pub mod analysis;
pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod transcript;
pub mod transport;
pub mod youtube;

use regex::Regex;
use serde::Serialize;

pub use error::{Error, Result};
pub use retrieval::Strategy;

/// A single caption item as it appears in a timed-text document
#[derive(Debug, Clone, PartialEq)]
pub struct RawCaption {
    pub text: String,
    pub start_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

/// One caption track offered by the platform for a video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: Option<String>,
    pub is_generated: bool,
    pub is_default: bool,
    #[serde(skip)]
    pub base_url: String,
}

impl CaptionTrack {
    /// Lower-cased primary subtag of the language code (`pt-BR` -> `pt`)
    pub fn primary_language(&self) -> String {
        primary_subtag(&self.language_code)
    }
}

/// A normalized transcript line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    /// Whole seconds from the start of the video; `None` for bare text lines
    pub timestamp_seconds: Option<f64>,
    pub text: String,
}

/// Complete transcript for a video
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub lines: Vec<TranscriptLine>,
    pub language_hint: Option<String>,
    pub strategy: Strategy,
}

impl Transcript {
    /// Build a transcript, or `None` if no line carries any text
    pub fn new(
        video_id: &str,
        lines: Vec<TranscriptLine>,
        language_hint: Option<String>,
        strategy: Strategy,
    ) -> Option<Self> {
        if !lines.iter().any(|l| !l.text.trim().is_empty()) {
            return None;
        }
        Some(Self {
            video_id: video_id.to_string(),
            lines,
            language_hint,
            strategy,
        })
    }
}

/// Lower-cased primary subtag of a BCP-47-ish code (`ar-SA` -> `ar`, `en_US` -> `en`)
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let re = Regex::new(
        r"(?x)
        ^(?:
            (?:https?://)?(?:www\.|m\.)?
            (?:
                youtube\.com/watch\?(?:.*&)?v=
                | youtu\.be/
                | youtube\.com/embed/
                | youtube\.com/shorts/
            )
        )?
        ([a-zA-Z0-9_-]{11})
        (?:[?&\#/].*)?$
        ",
    )
    .ok()?;

    re.captures(input.trim()).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> TranscriptLine {
        TranscriptLine {
            timestamp_seconds: Some(0.0),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_embed_and_shorts_urls() {
        for url in [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url), Some("dQw4w9WgXcQ".to_string()), "{url}");
        }
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(extract_video_id("not-a-valid-id"), None);
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(extract_video_id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("ar-SA"), "ar");
        assert_eq!(primary_subtag("EN_us"), "en");
        assert_eq!(primary_subtag("de"), "de");
        assert_eq!(primary_subtag(""), "");
    }

    #[test]
    fn test_transcript_requires_text() {
        assert!(Transcript::new("id", vec![], None, Strategy::Direct).is_none());
        assert!(Transcript::new("id", vec![line("   ")], None, Strategy::Direct).is_none());
        let t = Transcript::new("id", vec![line("hi")], Some("en".into()), Strategy::Manual).unwrap();
        assert_eq!(t.lines.len(), 1);
        assert_eq!(t.strategy, Strategy::Manual);
    }
}
