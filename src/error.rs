//! Terminal error kinds surfaced by the library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The catalog is empty, or the watch page could not be fetched or parsed
    #[error("no captions available for video {video_id}: {reason}")]
    NoCaptionsAvailable { video_id: String, reason: String },

    /// Every retrieval strategy was tried and none produced a transcript
    #[error("transcript unavailable for video {video_id} (tried: {})", .attempts.join("; "))]
    TranscriptUnavailable { video_id: String, attempts: Vec<String> },

    /// The model reply failed validation; `raw` holds the reply for diagnostics
    #[error("malformed model response: {reason}")]
    MalformedResponse { reason: String, raw: String },
}

impl Error {
    pub fn no_captions(video_id: &str, reason: impl Into<String>) -> Self {
        Error::NoCaptionsAvailable {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
