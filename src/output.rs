use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::prompt::display_name;
use crate::transcript::format_transcript;
use crate::{Strategy, Transcript, primary_subtag};

const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "ur", "ps", "yi"];

// Unicode directional isolates
const RLI: char = '\u{2067}';
const PDI: char = '\u{2069}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

pub fn text_direction(language: &str) -> TextDirection {
    if RTL_LANGUAGES.contains(&primary_subtag(language).as_str()) {
        TextDirection::Rtl
    } else {
        TextDirection::Ltr
    }
}

/// What gets rendered for one analyzed video
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub video_id: &'a str,
    pub title: Option<&'a str>,
    pub language: &'a str,
    pub direction: TextDirection,
    pub strategy: Strategy,
    pub analysis: &'a AnalysisResult,
}

fn isolate(text: &str, direction: TextDirection) -> String {
    match direction {
        TextDirection::Rtl => format!("{RLI}{text}{PDI}"),
        TextDirection::Ltr => text.to_string(),
    }
}

/// Render the analysis as plain text sections
pub fn render_text(report: &Report<'_>) -> String {
    let dir = report.direction;
    let analysis = report.analysis;
    let mut out = String::new();

    if let Some(title) = report.title {
        out.push_str(&isolate(title, dir));
        out.push('\n');
    }
    out.push_str(&format!(
        "Video: {}  Language: {}  Captions: {}\n",
        report.video_id,
        display_name(report.language),
        report.strategy
    ));

    let abstract_text = if analysis.abstract_text.is_empty() {
        "No abstract available"
    } else {
        &analysis.abstract_text
    };
    out.push_str(&format!("\nAbstract\n{}\n", isolate(abstract_text, dir)));

    out.push_str("\nKey Points\n");
    let points = analysis.display_key_points();
    if points.is_empty() {
        out.push_str("  (none)\n");
    }
    for point in points {
        out.push_str(&format!("  • {}\n", isolate(&point, dir)));
    }

    let category = if analysis.category.is_empty() {
        "Uncategorized"
    } else {
        &analysis.category
    };
    out.push_str(&format!("\nCategory\n{}\n", isolate(category, dir)));
    out.push_str(&format!("\nDetailed Summary\n{}", isolate(&analysis.summary, dir)));

    out
}

pub fn render_json(report: &Report<'_>) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Render the transcript itself, one `[m:ss] text` line per caption
pub fn render_transcript(transcript: &Transcript) -> String {
    format_transcript(transcript)
}
