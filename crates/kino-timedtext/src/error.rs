//! Error types for Kino Timed Text

use thiserror::Error;

/// Result type alias for timed text operations
pub type Result<T> = std::result::Result<T, Error>;

/// Timed text error types
#[derive(Error, Debug)]
pub enum Error {
    // Track loading errors
    #[error("Failed to load track {source_id}: {reason}")]
    Load { source_id: String, reason: String },

    #[error("Track {source_id} is not loaded")]
    NotLoaded { source_id: String },

    #[error("Unknown or unavailable track: {0}")]
    UnknownSource(String),

    // Cue validation errors
    #[error("Invalid cue {cue_id}: end {end_time}s is not after start {start_time}s")]
    InvalidCue {
        cue_id: String,
        start_time: f64,
        end_time: f64,
    },

    #[error("Duplicate cue id: {0}")]
    DuplicateCue(String),

    #[error("Track contains no cues")]
    EmptyTrack,

    // Preference persistence errors
    #[error("Preference store error: {0}")]
    Preferences(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a load error for a track
    pub fn load(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Error::Load {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the player can carry on without intervention
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Load { .. } | Error::Preferences(_) | Error::Json(_) | Error::Io(_)
        )
    }

    /// Returns the error code for logs and event payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Load { .. } => "TRACK_LOAD",
            Error::NotLoaded { .. } => "TRACK_NOT_LOADED",
            Error::UnknownSource(_) => "UNKNOWN_TRACK",
            Error::InvalidCue { .. } => "INVALID_CUE",
            Error::DuplicateCue(_) => "DUPLICATE_CUE",
            Error::EmptyTrack => "EMPTY_TRACK",
            Error::Preferences(_) => "PREFERENCES",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
