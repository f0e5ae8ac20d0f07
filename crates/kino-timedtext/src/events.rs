//! Timed text events
//!
//! Published on a broadcast channel so menus and analytics can follow
//! selection and layout changes without polling.

use crate::types::{LayoutMode, TrackKind};
use serde::{Deserialize, Serialize};

/// Timed text event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimedTextEvent {
    /// Track list built from host discovery
    SourcesDiscovered {
        count: usize,
    },

    /// Track enabled for rendering
    SourceEnabled {
        source_id: String,
        language: String,
        kind: TrackKind,
        explicit: bool,
    },

    /// Track failed to load
    SourceFailed {
        source_id: String,
        reason: String,
    },

    /// Layout mode changed
    LayoutChanged {
        from: LayoutMode,
        to: LayoutMode,
    },
}
