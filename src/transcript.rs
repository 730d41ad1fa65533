use regex::Regex;

use crate::{Transcript, TranscriptLine};

/// `m:ss` with minutes unbounded (`75:03` for an hour and a quarter)
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Render one line as `[m:ss] text`, or bare text when it has no timestamp
pub fn format_line(line: &TranscriptLine) -> String {
    match line.timestamp_seconds {
        Some(ts) => format!("[{}] {}", format_timestamp(ts), line.text),
        None => line.text.clone(),
    }
}

/// Flatten a transcript into the text handed to the prompt builder
pub fn format_transcript(transcript: &Transcript) -> String {
    transcript
        .lines
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inverse of `format_transcript`. Blank lines are skipped.
pub fn parse_transcript(text: &str) -> Vec<TranscriptLine> {
    let Ok(re) = Regex::new(r"^\[(\d+):([0-5]\d)\]\s*(.*)$") else {
        return Vec::new();
    };

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| match re.captures(l) {
            Some(caps) => {
                let minutes: u64 = caps[1].parse().unwrap_or(0);
                let seconds: u64 = caps[2].parse().unwrap_or(0);
                TranscriptLine {
                    timestamp_seconds: Some((minutes * 60 + seconds) as f64),
                    text: caps[3].to_string(),
                }
            }
            None => TranscriptLine {
                timestamp_seconds: None,
                text: l.to_string(),
            },
        })
        .filter(|l| !l.text.is_empty())
        .collect()
}
