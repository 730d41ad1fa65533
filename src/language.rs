//! Heuristic language detection for a video.
//!
//! Signals are checked in a fixed order and the first confident one wins:
//! non-default-language hints from the player caption tracks, the catalog's default
//! track, script ranges in the title/description, the page's `lang`
//! attribute, locale meta tags, then the default code. Detection never fails.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{CaptionTrack, primary_subtag};

/// Inclusive range of Unicode scalar values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptRange {
    pub start: u32,
    pub end: u32,
}

impl ScriptRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, c: char) -> bool {
        (self.start..=self.end).contains(&(c as u32))
    }
}

/// A language the detector knows how to recognize
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TargetLanguage {
    pub code: String,
    /// Lower-case substrings of track display names that indicate this language
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Script blocks specific enough to identify this language in free text
    #[serde(default)]
    pub scripts: Vec<ScriptRange>,
}

impl TargetLanguage {
    fn matches_code(&self, code: &str) -> bool {
        !code.trim().is_empty() && primary_subtag(code) == self.code
    }

    fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.aliases.iter().any(|a| !a.is_empty() && name.contains(&a.to_lowercase()))
    }

    fn matches_script(&self, text: &str) -> bool {
        !self.scripts.is_empty() && text.chars().any(|c| self.scripts.iter().any(|r| r.contains(c)))
    }
}

pub const DEFAULT_LANGUAGE: &str = "en";

pub fn default_targets() -> Vec<TargetLanguage> {
    vec![
        TargetLanguage {
            code: "en".to_string(),
            aliases: vec!["english".to_string()],
            scripts: vec![],
        },
        TargetLanguage {
            code: "ar".to_string(),
            aliases: vec!["arabic".to_string(), "العربية".to_string()],
            scripts: vec![
                ScriptRange::new(0x0600, 0x06FF),
                ScriptRange::new(0x0750, 0x077F),
                ScriptRange::new(0x08A0, 0x08FF),
                ScriptRange::new(0xFB50, 0xFDFF),
                ScriptRange::new(0xFE70, 0xFEFF),
            ],
        },
        TargetLanguage {
            code: "de".to_string(),
            aliases: vec!["german".to_string(), "deutsch".to_string()],
            scripts: vec![],
        },
    ]
}

/// Language hint for a caption track as listed in the embedded player data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackHint {
    pub code: String,
    pub name: Option<String>,
}

/// Everything the detector may look at besides the catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSignals {
    pub player_tracks: Vec<TrackHint>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub html_lang: Option<String>,
    pub meta_locales: Vec<String>,
}

/// Which signal decided the language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PlayerTrack,
    CatalogTrack,
    Script,
    HtmlLang,
    MetaLocale,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub code: String,
    pub signal: Signal,
}

#[derive(Debug, Clone)]
pub struct LanguageDetector {
    targets: Vec<TargetLanguage>,
    default_code: String,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(default_targets(), DEFAULT_LANGUAGE)
    }
}

impl LanguageDetector {
    /// `targets` order is the precedence order when several match the same signal
    pub fn new(targets: Vec<TargetLanguage>, default_code: &str) -> Self {
        let targets = targets
            .into_iter()
            .map(|mut t| {
                t.code = primary_subtag(&t.code);
                t
            })
            .filter(|t| !t.code.is_empty())
            .collect();
        Self {
            targets,
            default_code: primary_subtag(default_code),
        }
    }

    pub fn targets(&self) -> &[TargetLanguage] {
        &self.targets
    }

    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    pub fn detect(&self, catalog: &[CaptionTrack], signals: &PageSignals) -> String {
        self.detect_with_signal(catalog, signals).code
    }

    pub fn detect_with_signal(&self, catalog: &[CaptionTrack], signals: &PageSignals) -> Detection {
        let steps = [
            (Signal::PlayerTrack, self.from_player_tracks(&signals.player_tracks)),
            (Signal::CatalogTrack, from_catalog(catalog)),
            (Signal::Script, self.from_scripts(signals)),
            (Signal::HtmlLang, self.from_prefix(signals.html_lang.iter())),
            (Signal::MetaLocale, self.from_prefix(signals.meta_locales.iter())),
        ];

        for (signal, code) in steps {
            if let Some(code) = code {
                debug!("Detected language {code} from {signal:?}");
                return Detection { code, signal };
            }
        }

        debug!("No language signal found, defaulting to {}", self.default_code);
        Detection {
            code: self.default_code.clone(),
            signal: Signal::Default,
        }
    }

    /// Only non-default targets count here; a track in the default language
    /// is left to the catalog step so the default track can still decide.
    fn from_player_tracks(&self, hints: &[TrackHint]) -> Option<String> {
        hints.iter().find_map(|hint| {
            self.targets
                .iter()
                .filter(|t| t.code != self.default_code)
                .find(|t| t.matches_code(&hint.code) || hint.name.as_deref().is_some_and(|n| t.matches_name(n)))
                .map(|t| t.code.clone())
        })
    }

    fn from_scripts(&self, signals: &PageSignals) -> Option<String> {
        let texts = [signals.title.as_deref(), signals.description.as_deref()];
        texts.into_iter().flatten().find_map(|text| {
            self.targets
                .iter()
                .find(|t| t.matches_script(text))
                .map(|t| t.code.clone())
        })
    }

    fn from_prefix<'a>(&self, values: impl Iterator<Item = &'a String>) -> Option<String> {
        for value in values {
            if let Some(t) = self.targets.iter().find(|t| t.matches_code(value)) {
                return Some(t.code.clone());
            }
        }
        None
    }
}

fn from_catalog(catalog: &[CaptionTrack]) -> Option<String> {
    catalog
        .iter()
        .find(|t| t.is_default)
        .or_else(|| catalog.first())
        .map(|t| t.primary_language())
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(code: &str, is_default: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: code.to_string(),
            name: None,
            is_generated: false,
            is_default,
            base_url: format!("https://example.test/{code}"),
        }
    }

    #[test]
    fn test_arabic_title_without_tracks() {
        let signals = PageSignals {
            title: Some("مرحبا بكم".to_string()),
            ..Default::default()
        };
        let detection = LanguageDetector::default().detect_with_signal(&[], &signals);
        assert_eq!(detection.code, "ar");
        assert_eq!(detection.signal, Signal::Script);
    }

    #[test]
    fn test_player_track_name_alias() {
        let signals = PageSignals {
            player_tracks: vec![TrackHint {
                code: "xx".to_string(),
                name: Some("Arabic (auto-generated)".to_string()),
            }],
            ..Default::default()
        };
        assert_eq!(LanguageDetector::default().detect(&[], &signals), "ar");
    }

    #[test]
    fn test_player_track_code_prefix() {
        let signals = PageSignals {
            player_tracks: vec![TrackHint {
                code: "de-DE".to_string(),
                name: None,
            }],
            html_lang: Some("en".to_string()),
            ..Default::default()
        };
        assert_eq!(LanguageDetector::default().detect(&[], &signals), "de");
    }

    #[test]
    fn test_english_track_does_not_preempt_arabic_default() {
        let html = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://example.test/en","name":{"simpleText":"English"},"languageCode":"en"},{"baseUrl":"https://example.test/ar","name":{"simpleText":"Arabic (auto-generated)"},"languageCode":"ar","kind":"asr"}],"audioTracks":[{"defaultCaptionTrackIndex":1}]}}};</script>"#;
        let page = crate::youtube::WatchPage::from_html(html);
        assert!(page.tracks[1].is_default);

        let detection = LanguageDetector::default().detect_with_signal(&page.tracks, &page.signals);
        assert_eq!(detection.code, "ar");
        assert_eq!(detection.signal, Signal::PlayerTrack);
    }

    #[test]
    fn test_english_only_tracks_fall_through_to_catalog() {
        let signals = PageSignals {
            player_tracks: vec![TrackHint {
                code: "en".to_string(),
                name: Some("English".to_string()),
            }],
            ..Default::default()
        };
        let catalog = vec![track("en", true)];
        let detection = LanguageDetector::default().detect_with_signal(&catalog, &signals);
        assert_eq!(detection.code, "en");
        assert_eq!(detection.signal, Signal::CatalogTrack);
    }

    #[test]
    fn test_catalog_default_track_normalized() {
        let catalog = vec![track("fr", false), track("pt-BR", true)];
        let detection = LanguageDetector::default().detect_with_signal(&catalog, &PageSignals::default());
        assert_eq!(detection.code, "pt");
        assert_eq!(detection.signal, Signal::CatalogTrack);
    }

    #[test]
    fn test_catalog_first_track_when_no_default() {
        let catalog = vec![track("AR-sa", false), track("en", false)];
        assert_eq!(LanguageDetector::default().detect(&catalog, &PageSignals::default()), "ar");
    }

    #[test]
    fn test_earlier_signal_wins_conflict() {
        let catalog = vec![track("ar", false)];
        let signals = PageSignals {
            html_lang: Some("en-US".to_string()),
            ..Default::default()
        };
        assert_eq!(LanguageDetector::default().detect(&catalog, &signals), "ar");
    }

    #[test]
    fn test_html_lang_then_meta_locale() {
        let detector = LanguageDetector::default();
        let signals = PageSignals {
            html_lang: Some("de-AT".to_string()),
            meta_locales: vec!["ar_AR".to_string()],
            ..Default::default()
        };
        assert_eq!(detector.detect_with_signal(&[], &signals).signal, Signal::HtmlLang);
        assert_eq!(detector.detect(&[], &signals), "de");

        let signals = PageSignals {
            html_lang: Some("fr".to_string()),
            meta_locales: vec!["ar_AR".to_string()],
            ..Default::default()
        };
        assert_eq!(detector.detect_with_signal(&[], &signals).signal, Signal::MetaLocale);
        assert_eq!(detector.detect(&[], &signals), "ar");
    }

    #[test]
    fn test_defaults_when_inconclusive() {
        let signals = PageSignals {
            title: Some("Hello world".to_string()),
            html_lang: Some("fr".to_string()),
            ..Default::default()
        };
        let detection = LanguageDetector::default().detect_with_signal(&[], &signals);
        assert_eq!(detection.code, "en");
        assert_eq!(detection.signal, Signal::Default);
    }

    #[test]
    fn test_configured_target_and_default() {
        let targets = vec![TargetLanguage {
            code: "RU".to_string(),
            aliases: vec!["russian".to_string()],
            scripts: vec![ScriptRange::new(0x0400, 0x04FF)],
        }];
        let detector = LanguageDetector::new(targets, "de");
        let signals = PageSignals {
            description: Some("Привет".to_string()),
            ..Default::default()
        };
        assert_eq!(detector.detect(&[], &signals), "ru");
        assert_eq!(detector.detect(&[], &PageSignals::default()), "de");
    }
}
