//! Kino Timed Text - Caption track selection and rendering for Kino
//!
//! This crate provides the timed text engine of the player:
//! - Caption/subtitle track sources with one-shot async loading
//! - Interval index answering "which cues are active at t"
//! - Deterministic track selection from user preferences
//! - Diff-based render scheduling driven by the player clock
//! - Layout modes (overlay, below video, off) with capability downgrade
//! - Preference persistence and timed text events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Kino Timed Text                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Track     │  │   Caption    │  │  Selection   │           │
//! │  │   Sources    │──│    Index     │  │   Policy     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │        clock ────▶ │  TimedText  │ ────▶ events                 │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    Layout    │──│   Render    │──│   Render     │            │
//! │  │    Policy    │  │  Scheduler  │  │   Surface    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod index;
pub mod loader;
pub mod source;
pub mod selection;
pub mod layout;
pub mod render;
pub mod host;
pub mod preferences;
pub mod events;
pub mod timed_text;

pub use error::{Error, Result};
pub use types::*;
pub use index::CaptionIndex;
pub use loader::{MemoryTrackLoader, TrackLoader};
pub use source::{LoadedCaptions, TrackSource};
pub use selection::{group_by_kind, SelectionPolicy, SelectionState};
pub use layout::{font_size_percent, interface_text_style, CaptionStyle, LayoutPolicy, LayoutTransition, Placement};
pub use render::{
    ActiveCue, RecordingSurface, Removal, RenderHandle, RenderInstruction, RenderScheduler, RenderSurface,
    TickReport,
};
pub use host::{HostCapabilities, StaticCapabilities, TrackDiscovery};
pub use preferences::{JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use events::TimedTextEvent;
pub use timed_text::{TimedText, TimedTextBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the timed text library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Timed Text initialized");
}
