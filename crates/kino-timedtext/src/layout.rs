//! Caption layout policy
//!
//! Tracks the layout mode (ontop / below / off) and turns it into placement
//! directives for the render surface.

use crate::types::{LayoutMode, StyleDescriptor, SurfaceSize};
use serde::{Deserialize, Serialize};

/// Result of a layout state machine transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTransition {
    Unchanged,
    Changed { from: LayoutMode, to: LayoutMode },
}

impl LayoutTransition {
    pub fn is_changed(&self) -> bool {
        matches!(self, LayoutTransition::Changed { .. })
    }
}

/// Where a caption goes on the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    /// Overlaid on the video
    Overlay,
    /// In a bar under the video
    BelowVideo { bar_height: u32 },
}

/// Styling directives for one added caption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionStyle {
    pub placement: Placement,
    /// Properties of the caption box
    pub container: StyleDescriptor,
    /// Properties of the inner text span (the cue's named style)
    pub text: StyleDescriptor,
}

/// Layout mode state machine
#[derive(Debug, Clone)]
pub struct LayoutPolicy {
    mode: LayoutMode,
    overlay_supported: bool,
    below_bar_height: u32,
}

impl LayoutPolicy {
    /// Start in `mode`, assuming overlays are supported until told otherwise
    pub fn new(mode: LayoutMode, below_bar_height: u32) -> Self {
        Self {
            mode,
            overlay_supported: true,
            below_bar_height,
        }
    }

    /// Current mode
    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn overlay_supported(&self) -> bool {
        self.overlay_supported
    }

    /// Record the host's overlay capability
    ///
    /// Downgrades `ontop` to `below` when overlays are unsupported. Regaining
    /// the capability does not switch back.
    pub fn apply_capability(&mut self, overlay_supported: bool) -> LayoutTransition {
        self.overlay_supported = overlay_supported;
        let target = self.resolve(self.mode);
        self.transition_to(target)
    }

    /// User selection of a layout mode
    pub fn select(&mut self, requested: LayoutMode) -> LayoutTransition {
        let target = self.resolve(requested);
        self.transition_to(target)
    }

    fn resolve(&self, requested: LayoutMode) -> LayoutMode {
        match requested {
            LayoutMode::OnTop if !self.overlay_supported => LayoutMode::Below,
            mode => mode,
        }
    }

    fn transition_to(&mut self, target: LayoutMode) -> LayoutTransition {
        if target == self.mode {
            return LayoutTransition::Unchanged;
        }
        let from = std::mem::replace(&mut self.mode, target);
        LayoutTransition::Changed { from, to: target }
    }

    /// Modes a user may pick, in menu order
    pub fn available_modes(&self) -> Vec<LayoutMode> {
        let mut modes = Vec::with_capacity(3);
        if self.overlay_supported {
            modes.push(LayoutMode::OnTop);
        }
        modes.push(LayoutMode::Below);
        modes.push(LayoutMode::Off);
        modes
    }

    /// Placement and styling for a newly added caption
    pub fn caption_style(&self, cue_style: Option<&StyleDescriptor>, size: SurfaceSize) -> CaptionStyle {
        let font_size = format!("{}%", font_size_percent(size.width));

        let (placement, container) = match self.mode {
            LayoutMode::Below => (
                Placement::BelowVideo {
                    bar_height: self.below_bar_height,
                },
                StyleDescriptor::new()
                    .with("position", "absolute")
                    .with("top", format!("{}px", size.height))
                    .with("display", "block")
                    .with("width", "100%")
                    .with("height", format!("{}px", self.below_bar_height))
                    .with("background-color", "#000")
                    .with("color", "white")
                    .with("text-align", "center")
                    .with("padding-top", "5px")
                    .with("font-size", &font_size),
            ),
            // Off never reaches the surface, treat like ontop
            LayoutMode::OnTop | LayoutMode::Off => (
                Placement::Overlay,
                StyleDescriptor::new()
                    .with("position", "absolute")
                    .with("bottom", "10px")
                    .with("width", "100%")
                    .with("display", "block")
                    .with("opacity", "0.8")
                    .with("text-align", "center")
                    .with("z-index", "2")
                    .with("font-size", &font_size),
            ),
        };

        CaptionStyle {
            placement,
            container,
            text: cue_style.cloned().unwrap_or_default(),
        }
    }
}

/// Text size relative to the interface width, 400px wide is roughly 105%
pub fn font_size_percent(width: u32) -> u32 {
    (width as f64 / 5.2).clamp(95.0, 200.0).round() as u32
}

/// Style applied to every visible caption after a resize
pub fn interface_text_style(size: SurfaceSize) -> StyleDescriptor {
    StyleDescriptor::new().with("font-size", format!("{}%", font_size_percent(size.width)))
}
