//! Core types for Kino Timed Text

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use url::Url;

// =============================================================================
// Track Kinds
// =============================================================================

/// Category of a timed text track
///
/// Closed set of category codes. Anything unrecognized, including a missing
/// code, maps to [`TrackKind::Uncategorized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackKind {
    /// Closed captions (speaker identification, sound effects)
    Captions,
    /// Subtitles (dialogue translation)
    Subtitles,
    /// Textual audio description
    AudioDescription,
    /// Karaoke lyrics
    Karaoke,
    /// Ticker text
    Ticker,
    /// Active regions
    ActiveRegions,
    /// Annotations
    Annotation,
    /// Metadata
    Metadata,
    /// Transcript
    Transcript,
    /// Lyrics
    Lyrics,
    /// Linguistic markup
    Linguistic,
    /// Cue points
    CuePoints,
    /// Unknown or missing category
    Uncategorized,
}

impl TrackKind {
    /// Every categorized kind, in menu order
    pub const ALL: [TrackKind; 12] = [
        TrackKind::Captions,
        TrackKind::Subtitles,
        TrackKind::AudioDescription,
        TrackKind::Karaoke,
        TrackKind::Ticker,
        TrackKind::ActiveRegions,
        TrackKind::Annotation,
        TrackKind::Metadata,
        TrackKind::Transcript,
        TrackKind::Lyrics,
        TrackKind::Linguistic,
        TrackKind::CuePoints,
    ];

    /// Parse a category code, case-insensitively
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code))
            .unwrap_or(TrackKind::Uncategorized)
    }

    /// Category code
    pub fn code(&self) -> &'static str {
        match self {
            TrackKind::Captions => "CC",
            TrackKind::Subtitles => "SUB",
            TrackKind::AudioDescription => "TAD",
            TrackKind::Karaoke => "KTV",
            TrackKind::Ticker => "TIK",
            TrackKind::ActiveRegions => "AR",
            TrackKind::Annotation => "NB",
            TrackKind::Metadata => "META",
            TrackKind::Transcript => "TRX",
            TrackKind::Lyrics => "LRC",
            TrackKind::Linguistic => "LIN",
            TrackKind::CuePoints => "CUE",
            TrackKind::Uncategorized => "",
        }
    }
}

impl From<String> for TrackKind {
    fn from(code: String) -> Self {
        TrackKind::from_code(&code)
    }
}

impl From<TrackKind> for String {
    fn from(kind: TrackKind) -> Self {
        kind.code().to_string()
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Captions => write!(f, "captions"),
            TrackKind::Subtitles => write!(f, "subtitles"),
            TrackKind::AudioDescription => write!(f, "audio description"),
            TrackKind::Karaoke => write!(f, "karaoke"),
            TrackKind::Ticker => write!(f, "ticker"),
            TrackKind::ActiveRegions => write!(f, "active regions"),
            TrackKind::Annotation => write!(f, "annotation"),
            TrackKind::Metadata => write!(f, "metadata"),
            TrackKind::Transcript => write!(f, "transcript"),
            TrackKind::Lyrics => write!(f, "lyrics"),
            TrackKind::Linguistic => write!(f, "linguistic"),
            TrackKind::CuePoints => write!(f, "cue points"),
            TrackKind::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

// =============================================================================
// Track Loading
// =============================================================================

/// Load state of a track source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::NotLoaded => write!(f, "not loaded"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Loaded => write!(f, "loaded"),
            LoadState::Failed => write!(f, "failed"),
        }
    }
}

/// Raw track description as reported by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Host-assigned identifier, generated from language and kind if absent
    pub id: Option<String>,
    /// Source language tag (any case)
    pub srclang: String,
    /// Category code
    pub kind: Option<String>,
    /// Human-readable title
    pub label: Option<String>,
    /// Location of the caption resource
    pub src: Option<Url>,
}

impl TrackDescriptor {
    /// Create a descriptor for a language and category code
    pub fn new(srclang: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            srclang: srclang.into(),
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    /// Set the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the title
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the resource location
    pub fn with_src(mut self, src: Url) -> Self {
        self.src = Some(src);
        self
    }
}

/// Parsed payload delivered by a track loader
#[derive(Debug, Clone, Default)]
pub struct LoadedTrack {
    /// Cues in any order
    pub cues: Vec<Cue>,
    /// Named styles referenced by `Cue::style_id`
    pub styles: HashMap<String, StyleDescriptor>,
}

// =============================================================================
// Cues and Styles
// =============================================================================

/// A single timed caption entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Identifier, unique within its source
    pub id: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds (exclusive)
    pub end_time: f64,
    /// Rich text payload, passed through to the render surface
    pub content: String,
    /// Named style defined by the source
    pub style_id: Option<String>,
}

impl Cue {
    /// Create a new cue
    pub fn new(
        id: impl Into<String>,
        start_time: f64,
        end_time: f64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            content: content.into(),
            style_id: None,
        }
    }

    /// Reference a named style
    pub fn with_style(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    /// Duration of this cue in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check if cue should be displayed at given time
    pub fn is_active_at(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

/// Presentation properties, opaque to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleDescriptor(pub BTreeMap<String, String>);

impl StyleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, builder style
    pub fn with(mut self, property: impl Into<String>, value: impl ToString) -> Self {
        self.set(property, value);
        self
    }

    /// Set a property
    pub fn set(&mut self, property: impl Into<String>, value: impl ToString) {
        self.0.insert(property.into(), value.to_string());
    }

    /// Get a property
    pub fn get(&self, property: &str) -> Option<&str> {
        self.0.get(property).map(String::as_str)
    }

    /// Merge another descriptor over this one
    pub fn extend(&mut self, other: &StyleDescriptor) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Key of a rendered cue: (source id, cue id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CueKey {
    pub source_id: String,
    pub cue_id: String,
}

impl CueKey {
    pub fn new(source_id: impl Into<String>, cue_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            cue_id: cue_id.into(),
        }
    }
}

impl std::fmt::Display for CueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source_id, self.cue_id)
    }
}

// =============================================================================
// Layout and Preferences
// =============================================================================

/// Caption placement strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Overlaid on the video
    OnTop,
    /// In a bar below the video
    Below,
    /// Captions hidden
    Off,
}

impl std::fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutMode::OnTop => write!(f, "ontop"),
            LayoutMode::Below => write!(f, "below"),
            LayoutMode::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ontop" => Ok(LayoutMode::OnTop),
            "below" => Ok(LayoutMode::Below),
            "off" => Ok(LayoutMode::Off),
            other => Err(format!("unknown layout mode: {other}")),
        }
    }
}

/// Player interface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(400, 300)
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Preferred language tag
    pub language: String,
    /// Preferred track kind
    pub kind: TrackKind,
    /// Preferred layout
    pub layout: LayoutMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            kind: TrackKind::Subtitles,
            layout: LayoutMode::OnTop,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Timed text engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedTextConfig {
    /// Fallback language when no preferred track matches
    pub default_language: String,
    /// Host clock tick interval, also used as the fade-out duration
    pub monitor_rate: Duration,
    /// Seconds added to every clock tick before querying cues
    pub time_offset: f64,
    /// Height of the caption bar in below-video layout (pixels)
    pub below_bar_height: u32,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for TimedTextConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            monitor_rate: Duration::from_millis(250),
            time_offset: 0.0,
            below_bar_height: 60,
            event_capacity: 64,
        }
    }
}
