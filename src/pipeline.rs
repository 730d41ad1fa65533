use log::info;

use crate::error::Result;
use crate::language::{LanguageDetector, Signal};
use crate::prompt::build_prompt;
use crate::retrieval::{LanguagePreferences, acquire_from_catalog};
use crate::transcript::format_transcript;
use crate::youtube::{CaptionSource, load_catalog};
use crate::{Transcript, primary_subtag};

/// Everything needed to ask the model about one video
#[derive(Debug, Clone)]
pub struct Prepared {
    pub video_id: String,
    pub title: Option<String>,
    pub language: String,
    pub language_signal: Option<Signal>,
    pub transcript: Transcript,
    pub prompt: String,
}

/// Load the catalog once, detect the language, fetch the transcript with the
/// detected language preferred, and build the prompt. `language_override`
/// skips detection.
pub async fn prepare<S: CaptionSource + ?Sized>(
    source: &S,
    detector: &LanguageDetector,
    prefs: &LanguagePreferences,
    video_id: &str,
    language_override: Option<&str>,
) -> Result<Prepared> {
    let page = load_catalog(source, video_id).await?;

    let (language, language_signal) = match language_override {
        Some(code) => (primary_subtag(code), None),
        None => {
            let detection = detector.detect_with_signal(&page.tracks, &page.signals);
            (detection.code, Some(detection.signal))
        }
    };
    info!("Language for {video_id}: {language} ({language_signal:?})");

    let prefs = prefs.clone().with_detected(&language);
    let transcript = acquire_from_catalog(source, video_id, &page.tracks, &prefs).await?;
    let prompt = build_prompt(&format_transcript(&transcript), &language);

    Ok(Prepared {
        video_id: video_id.to_string(),
        title: page.signals.title,
        language,
        language_signal,
        transcript,
        prompt,
    })
}
