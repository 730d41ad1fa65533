use crate::primary_subtag;

/// Human-readable name for a language code; unknown codes are returned as-is
pub fn display_name(code: &str) -> String {
    match primary_subtag(code).as_str() {
        "en" => "English".to_string(),
        "ar" => "Arabic".to_string(),
        "de" => "German".to_string(),
        _ => code.to_string(),
    }
}

/// Build the analysis request for the model. The transcript goes last.
pub fn build_prompt(transcript: &str, language_code: &str) -> String {
    let language = display_name(language_code);

    format!(
        "Analyze the following video transcript and respond in {language}. \
Write every section in {language}, even if parts of the transcript use another language.

Use exactly these four sections, with the headings written exactly as shown:

**Abstract:**
A short paragraph (2-3 sentences) describing what the video is about.

**Key Concepts:**
- One bullet per key concept, fact or argument, each starting with \"-\"
- List between 3 and 7 bullets

**Category:**
A single category that best describes the video (for example: Education, Technology, News, Entertainment).

**Detailed Summary:**
A detailed summary of several paragraphs covering the main topic, the key arguments or information, and the conclusions.

Transcript:
{transcript}"
    )
}
