//! Transcript retrieval as an ordered chain of fallback strategies.
//!
//! Strategies run strictly one after another, each only when the previous
//! one failed or came back empty. A strategy's own failure is logged and
//! recorded as an attempt; only exhaustion of the whole chain is an error.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::youtube::{CaptionSource, load_catalog};
use crate::{CaptionTrack, RawCaption, Transcript, TranscriptLine, primary_subtag};

pub const PREFERRED_LANGUAGES: &[&str] = &["en", "ar", "de"];
pub const EXTENDED_LANGUAGES: &[&str] = &[
    "en", "ar", "de", "fr", "es", "pt", "it", "ru", "ja", "ko", "zh", "hi", "tr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Whatever the platform serves by default, without consulting the catalog
    Direct,
    /// Human-authored tracks only
    Manual,
    /// Auto-generated tracks only
    Generated,
    /// Any track, over the extended language list
    Any,
}

impl Strategy {
    pub const CHAIN: [Strategy; 4] = [Strategy::Direct, Strategy::Manual, Strategy::Generated, Strategy::Any];

    /// Pick a catalog track for this strategy. `Direct` never selects from the catalog.
    pub fn select<'a>(&self, catalog: &'a [CaptionTrack], prefs: &LanguagePreferences) -> Option<&'a CaptionTrack> {
        match self {
            Strategy::Direct => None,
            Strategy::Manual => pick(catalog.iter().filter(|t| !t.is_generated), &prefs.preferred),
            Strategy::Generated => pick(catalog.iter().filter(|t| t.is_generated), &prefs.preferred),
            Strategy::Any => pick(catalog.iter(), &prefs.extended),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Manual => write!(f, "manual"),
            Strategy::Generated => write!(f, "generated"),
            Strategy::Any => write!(f, "any"),
        }
    }
}

/// First track matching the earliest preferred language, else the first track
fn pick<'a>(tracks: impl Iterator<Item = &'a CaptionTrack>, languages: &[String]) -> Option<&'a CaptionTrack> {
    let tracks: Vec<&CaptionTrack> = tracks.collect();
    languages
        .iter()
        .find_map(|lang| tracks.iter().find(|t| t.primary_language() == *lang).copied())
        .or_else(|| tracks.first().copied())
}

/// Language precedence lists used when choosing tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreferences {
    pub preferred: Vec<String>,
    pub extended: Vec<String>,
}

impl Default for LanguagePreferences {
    fn default() -> Self {
        Self::new(
            PREFERRED_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            EXTENDED_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl LanguagePreferences {
    pub fn new(preferred: Vec<String>, extended: Vec<String>) -> Self {
        Self {
            preferred: normalize_codes(preferred),
            extended: normalize_codes(extended),
        }
    }

    /// Move `code` to the front of both lists
    pub fn with_detected(mut self, code: &str) -> Self {
        let code = primary_subtag(code);
        if code.is_empty() {
            return self;
        }
        for list in [&mut self.preferred, &mut self.extended] {
            list.retain(|c| *c != code);
            list.insert(0, code.clone());
        }
        self
    }

    fn first(&self) -> &str {
        self.preferred
            .first()
            .or_else(|| self.extended.first())
            .map(String::as_str)
            .unwrap_or(crate::language::DEFAULT_LANGUAGE)
    }
}

fn normalize_codes(codes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .map(|c| primary_subtag(c))
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

/// Convert raw caption items into transcript lines. Whitespace-only items are
/// dropped; timestamps are whole seconds.
pub fn normalize(raw: &[RawCaption]) -> Vec<TranscriptLine> {
    raw.iter()
        .filter_map(|item| {
            let text = item.text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(TranscriptLine {
                timestamp_seconds: item.start_ms.map(|ms| (ms / 1000) as f64),
                text,
            })
        })
        .collect()
}

/// Fetch the catalog, then run the strategy chain over it.
/// Fails with `NoCaptionsAvailable` before any strategy runs if the catalog is empty.
pub async fn acquire_transcript<S: CaptionSource + ?Sized>(
    source: &S,
    video_id: &str,
    prefs: &LanguagePreferences,
) -> Result<Transcript> {
    let page = load_catalog(source, video_id).await?;
    acquire_from_catalog(source, video_id, &page.tracks, prefs).await
}

/// Run the strategy chain over an already loaded catalog
pub async fn acquire_from_catalog<S: CaptionSource + ?Sized>(
    source: &S,
    video_id: &str,
    catalog: &[CaptionTrack],
    prefs: &LanguagePreferences,
) -> Result<Transcript> {
    if catalog.is_empty() {
        return Err(Error::no_captions(video_id, "caption catalog is empty"));
    }

    let mut attempts = Vec::new();
    let mut fetched: HashSet<&str> = HashSet::new();

    for strategy in Strategy::CHAIN {
        let (raw, hint) = match strategy {
            Strategy::Direct => {
                let lang = prefs.first();
                match source.fetch_default(video_id, lang).await {
                    Ok(raw) => (raw, Some(lang.to_string())),
                    Err(e) => {
                        warn!("Strategy {strategy} failed for {video_id}: {e}");
                        attempts.push(format!("{strategy}: {e}"));
                        continue;
                    }
                }
            }
            _ => {
                let Some(track) = strategy.select(catalog, prefs) else {
                    debug!("Strategy {strategy}: no matching track");
                    attempts.push(format!("{strategy}: no matching track"));
                    continue;
                };
                if !fetched.insert(track.base_url.as_str()) {
                    debug!("Strategy {strategy}: track {} already tried", track.language_code);
                    attempts.push(format!("{strategy}: {} already tried", track.language_code));
                    continue;
                }
                match source.fetch_track(track).await {
                    Ok(raw) => (raw, Some(track.primary_language())),
                    Err(e) => {
                        warn!("Strategy {strategy} failed for {video_id} ({}): {e}", track.language_code);
                        attempts.push(format!("{strategy}: {e}"));
                        continue;
                    }
                }
            }
        };

        match Transcript::new(video_id, normalize(&raw), hint, strategy) {
            Some(transcript) => {
                info!(
                    "Transcript for {video_id} via {strategy} strategy: {} lines",
                    transcript.lines.len()
                );
                return Ok(transcript);
            }
            None => {
                debug!("Strategy {strategy} returned no lines");
                attempts.push(format!("{strategy}: no lines"));
            }
        }
    }

    Err(Error::TranscriptUnavailable {
        video_id: video_id.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use eyre::bail;

    use super::*;
    use crate::youtube::WatchPage;

    fn track(code: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: code.to_string(),
            name: None,
            is_generated: generated,
            is_default: false,
            base_url: format!("https://example.test/{code}/{generated}"),
        }
    }

    fn caption(text: &str, start_ms: u64) -> RawCaption {
        RawCaption {
            text: text.to_string(),
            start_ms: Some(start_ms),
            duration_ms: Some(1000),
        }
    }

    /// Serves canned captions per track URL and records every fetch
    #[derive(Default)]
    struct FakeSource {
        catalog: Vec<CaptionTrack>,
        direct: Option<Vec<RawCaption>>,
        tracks: Vec<(String, Vec<RawCaption>)>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CaptionSource for FakeSource {
        async fn watch_page(&self, _video_id: &str) -> Result<WatchPage> {
            Ok(WatchPage {
                has_player_data: true,
                tracks: self.catalog.clone(),
                signals: Default::default(),
            })
        }

        async fn fetch_track(&self, track: &CaptionTrack) -> eyre::Result<Vec<RawCaption>> {
            self.calls.lock().unwrap().push(track.base_url.clone());
            match self.tracks.iter().find(|(url, _)| *url == track.base_url) {
                Some((_, raw)) => Ok(raw.clone()),
                None => bail!("track fetch failed"),
            }
        }

        async fn fetch_default(&self, _video_id: &str, lang: &str) -> eyre::Result<Vec<RawCaption>> {
            self.calls.lock().unwrap().push(format!("default:{lang}"));
            match self.direct {
                Some(ref raw) => Ok(raw.clone()),
                None => bail!("default fetch failed"),
            }
        }
    }

    #[test]
    fn test_manual_english_preferred_over_generated() {
        let catalog = vec![track("en", true), track("de", false), track("en", false)];
        let prefs = LanguagePreferences::default();
        let chosen = Strategy::Manual.select(&catalog, &prefs).unwrap();
        assert_eq!(chosen.language_code, "en");
        assert!(!chosen.is_generated);
    }

    #[test]
    fn test_select_falls_back_to_first_filtered() {
        let catalog = vec![track("ja", true), track("fr", false), track("ko", false)];
        let prefs = LanguagePreferences::default();
        assert_eq!(Strategy::Manual.select(&catalog, &prefs).unwrap().language_code, "fr");
        assert_eq!(Strategy::Generated.select(&catalog, &prefs).unwrap().language_code, "ja");
        // "fr" comes before "ja" and "ko" in the extended list
        assert_eq!(Strategy::Any.select(&catalog, &prefs).unwrap().language_code, "fr");
        assert!(Strategy::Direct.select(&catalog, &prefs).is_none());
    }

    #[test]
    fn test_select_matches_primary_subtag_in_precedence_order() {
        let catalog = vec![track("de-DE", false), track("ar-SA", false)];
        let prefs = LanguagePreferences::default();
        assert_eq!(Strategy::Manual.select(&catalog, &prefs).unwrap().language_code, "ar-SA");
    }

    #[test]
    fn test_with_detected_moves_language_first() {
        let prefs = LanguagePreferences::default().with_detected("de-AT");
        assert_eq!(prefs.preferred, vec!["de", "en", "ar"]);
        assert_eq!(prefs.extended[0], "de");
        assert_eq!(prefs.extended.iter().filter(|c| *c == "de").count(), 1);

        let prefs = LanguagePreferences::default().with_detected("sv");
        assert_eq!(prefs.preferred, vec!["sv", "en", "ar", "de"]);
    }

    #[test]
    fn test_normalize() {
        let raw = vec![
            caption("  Hello   world ", 1999),
            caption("   ", 2500),
            RawCaption {
                text: "no duration".to_string(),
                start_ms: Some(61_000),
                duration_ms: None,
            },
            RawCaption {
                text: "bare".to_string(),
                start_ms: None,
                duration_ms: None,
            },
        ];
        let lines = normalize(&raw);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "Hello world");
        assert_eq!(lines[0].timestamp_seconds, Some(1.0));
        assert_eq!(lines[1].timestamp_seconds, Some(61.0));
        assert_eq!(lines[2].timestamp_seconds, None);
        assert_eq!(lines[2].text, "bare");
    }

    #[tokio::test]
    async fn test_direct_strategy_wins_first() {
        let source = FakeSource {
            catalog: vec![track("en", false)],
            direct: Some(vec![caption("direct", 0)]),
            ..Default::default()
        };
        let t = acquire_transcript(&source, "vid", &LanguagePreferences::default()).await.unwrap();
        assert_eq!(t.strategy, Strategy::Direct);
        assert_eq!(t.lines[0].text, "direct");
        assert_eq!(t.language_hint.as_deref(), Some("en"));
        assert_eq!(*source.calls.lock().unwrap(), vec!["default:en".to_string()]);
    }

    #[tokio::test]
    async fn test_generated_english_after_direct_fails() {
        let en = track("en", true);
        let source = FakeSource {
            tracks: vec![(en.base_url.clone(), vec![caption("hello", 0), caption("world", 1500)])],
            catalog: vec![en],
            direct: None,
            ..Default::default()
        };
        let t = acquire_transcript(&source, "vid", &LanguagePreferences::default()).await.unwrap();
        assert_eq!(t.strategy, Strategy::Generated);
        assert_eq!(t.lines.len(), 2);
        assert_eq!(t.lines[1].timestamp_seconds, Some(1.0));
    }

    #[tokio::test]
    async fn test_empty_direct_result_falls_through_to_manual() {
        let ar = track("ar", false);
        let source = FakeSource {
            tracks: vec![(ar.base_url.clone(), vec![caption("مرحبا", 0)])],
            catalog: vec![track("en", true), ar],
            direct: Some(vec![caption("  ", 0)]),
            ..Default::default()
        };
        let prefs = LanguagePreferences::default().with_detected("ar");
        let t = acquire_transcript(&source, "vid", &prefs).await.unwrap();
        assert_eq!(t.strategy, Strategy::Manual);
        assert_eq!(t.language_hint.as_deref(), Some("ar"));
        assert_eq!(source.calls.lock().unwrap()[0], "default:ar");
    }

    #[tokio::test]
    async fn test_empty_catalog_attempts_nothing() {
        let source = FakeSource {
            direct: Some(vec![caption("never used", 0)]),
            ..Default::default()
        };
        let err = acquire_transcript(&source, "vid", &LanguagePreferences::default()).await.unwrap_err();
        assert!(matches!(err, Error::NoCaptionsAvailable { .. }));
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_attempts() {
        let source = FakeSource {
            catalog: vec![track("fr", false)],
            ..Default::default()
        };
        match acquire_transcript(&source, "vid", &LanguagePreferences::default()).await {
            Err(Error::TranscriptUnavailable { attempts, .. }) => {
                assert_eq!(attempts.len(), 4);
                assert!(attempts[0].starts_with("direct:"));
                assert!(attempts[1].starts_with("manual:"));
                assert_eq!(attempts[2], "generated: no matching track");
                assert_eq!(attempts[3], "any: fr already tried");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // The manual track is fetched once even though "any" selects it again
        assert_eq!(source.calls.lock().unwrap().len(), 2);
    }
}
