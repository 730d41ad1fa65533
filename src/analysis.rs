//! Turns the model's free-text reply into an `AnalysisResult`.
//!
//! Each section is looked up twice: first as a decorated heading
//! (`**Abstract:**`, optionally numbered or behind `#`), ending at the next
//! line-leading bold heading; then as a plain heading (`Abstract:` at the start
//! of a line), ending at the next known heading keyword. The first lookup that
//! captures non-empty text wins.

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

pub const MIN_ABSTRACT_CHARS: usize = 10;
pub const MIN_SUMMARY_CHARS: usize = 50;

const ABSTRACT: &[&str] = &["abstract"];
const KEY_POINTS: &[&str] = &["key concepts", "key points"];
const CATEGORY: &[&str] = &["category"];
const SUMMARY: &[&str] = &["detailed summary", "summary"];

/// Optional `#` markup and `1.`/`1)` numbering in front of a heading
const HEADING_PREFIX: &str = r"^[ \t]*(?:#{1,6}[ \t]*)?(?:\d+[.)][ \t]*)?";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub key_points: Vec<String>,
    pub category: String,
    pub summary: String,
}

impl AnalysisResult {
    /// Key points for display. When the reply had no bullet list, up to three
    /// longer sentences of the summary stand in.
    pub fn display_key_points(&self) -> Vec<String> {
        if !self.key_points.is_empty() {
            return self.key_points.clone();
        }
        self.summary
            .split('.')
            .map(str::trim)
            .filter(|s| s.chars().count() > 20)
            .take(3)
            .map(|s| format!("{s}."))
            .collect()
    }
}

struct FieldPatterns {
    decorated: Regex,
    plain: Regex,
}

struct SectionParser {
    decorated_end: Regex,
    plain_end: Regex,
    abstract_text: FieldPatterns,
    key_points: FieldPatterns,
    category: FieldPatterns,
    summary: FieldPatterns,
}

fn alternation(aliases: &[&str]) -> String {
    aliases
        .iter()
        .map(|alias| {
            alias
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
}

impl SectionParser {
    fn new() -> std::result::Result<Self, regex::Error> {
        let all: Vec<&str> = [ABSTRACT, KEY_POINTS, CATEGORY, SUMMARY].concat();

        Ok(Self {
            decorated_end: Regex::new(&format!(r"(?m){HEADING_PREFIX}\*\*[^*\n]+\*\*"))?,
            plain_end: Regex::new(&format!(
                r"(?im){HEADING_PREFIX}\**[ \t]*(?:{})[ \t]*(?:\*\*[ \t]*:?|:)",
                alternation(&all)
            ))?,
            abstract_text: Self::field(ABSTRACT)?,
            key_points: Self::field(KEY_POINTS)?,
            category: Self::field(CATEGORY)?,
            summary: Self::field(SUMMARY)?,
        })
    }

    fn field(aliases: &[&str]) -> std::result::Result<FieldPatterns, regex::Error> {
        let names = alternation(aliases);
        Ok(FieldPatterns {
            decorated: Regex::new(&format!(
                r"(?im){HEADING_PREFIX}\*\*[ \t]*(?:\d+[.)][ \t]*)?(?:{names})[ \t]*:?[ \t]*\*\*[ \t]*:?"
            ))?,
            plain: Regex::new(&format!(r"(?im){HEADING_PREFIX}(?:{names})[ \t]*:"))?,
        })
    }

    /// Text of the section for `field`, decorated form first
    fn section<'a>(&self, text: &'a str, field: &FieldPatterns) -> Option<&'a str> {
        capture(text, &field.decorated, &self.decorated_end).or_else(|| capture(text, &field.plain, &self.plain_end))
    }
}

/// First non-empty span between a `start` match and the next `end` match
fn capture<'a>(text: &'a str, start: &Regex, end: &Regex) -> Option<&'a str> {
    start.find_iter(text).find_map(|heading| {
        let body_start = heading.end();
        let body_end = end.find_at(text, body_start).map(|m| m.start()).unwrap_or(text.len());
        let body = text[body_start..body_end].trim();
        (!body.is_empty()).then_some(body)
    })
}

fn bullet_points(section: &str) -> Vec<String> {
    section
        .lines()
        .map(str::trim)
        .filter_map(|l| l.strip_prefix('•').or_else(|| l.strip_prefix('-')))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the model reply. Only the detailed summary is mandatory; a missing or
/// too-short summary is a `MalformedResponse` carrying the raw text.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult> {
    let parser = SectionParser::new().map_err(|e| Error::malformed(format!("invalid section pattern: {e}"), raw))?;

    let summary = parser
        .section(raw, &parser.summary)
        .filter(|s| s.chars().count() >= MIN_SUMMARY_CHARS)
        .ok_or_else(|| {
            Error::malformed(
                format!("detailed summary missing or shorter than {MIN_SUMMARY_CHARS} characters"),
                raw,
            )
        })?;

    let abstract_text = parser
        .section(raw, &parser.abstract_text)
        .filter(|s| s.chars().count() >= MIN_ABSTRACT_CHARS)
        .unwrap_or_default();

    let key_points = parser
        .section(raw, &parser.key_points)
        .map(bullet_points)
        .unwrap_or_default();

    let category = parser
        .section(raw, &parser.category)
        .map(|c| c.trim_matches(|ch: char| ch == '*' || ch == '_' || ch.is_whitespace()))
        .unwrap_or_default();

    Ok(AnalysisResult {
        abstract_text: abstract_text.to_string(),
        key_points,
        category: category.to_string(),
        summary: summary.to_string(),
    })
}
