//! Host player collaborators
//!
//! The engine never reaches into the host. It is handed these at
//! construction and consults them at well-defined points.

use crate::types::TrackDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};

/// Source discovery: which tracks the host media offers
pub trait TrackDiscovery: Send + Sync {
    /// Queried once at setup and again on explicit reset
    fn list_available_tracks(&self) -> Vec<TrackDescriptor>;
}

impl TrackDiscovery for Vec<TrackDescriptor> {
    fn list_available_tracks(&self) -> Vec<TrackDescriptor> {
        self.clone()
    }
}

/// Rendering capabilities of the host
pub trait HostCapabilities: Send + Sync {
    /// Whether captions can be overlaid on the video
    fn supports_overlay_placement(&self) -> bool;
}

/// Capabilities that can be flipped at runtime
#[derive(Debug)]
pub struct StaticCapabilities {
    overlay: AtomicBool,
}

impl StaticCapabilities {
    pub fn new(overlay: bool) -> Self {
        Self {
            overlay: AtomicBool::new(overlay),
        }
    }

    pub fn set_overlay(&self, overlay: bool) {
        self.overlay.store(overlay, Ordering::Release);
    }
}

impl Default for StaticCapabilities {
    fn default() -> Self {
        Self::new(true)
    }
}

impl HostCapabilities for StaticCapabilities {
    fn supports_overlay_placement(&self) -> bool {
        self.overlay.load(Ordering::Acquire)
    }
}
