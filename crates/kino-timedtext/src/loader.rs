//! Track loading collaborator
//!
//! Fetching and parsing caption resources happens outside the engine. A
//! [`TrackLoader`] turns a [`TrackDescriptor`] into parsed cues and styles;
//! timeouts and retries are its own business.

use crate::error::{Error, Result};
use crate::types::{LoadedTrack, TrackDescriptor};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for caption loaders
#[async_trait]
pub trait TrackLoader: Send + Sync {
    /// Fetch and parse the track described by `descriptor`
    async fn fetch(&self, descriptor: &TrackDescriptor) -> Result<LoadedTrack>;
}

/// Loader serving pre-parsed tracks from memory, keyed by track id
#[derive(Default)]
pub struct MemoryTrackLoader {
    tracks: RwLock<HashMap<String, LoadedTrack>>,
}

impl MemoryTrackLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the payload for a track id
    pub async fn insert(&self, id: impl Into<String>, track: LoadedTrack) {
        self.tracks.write().await.insert(id.into(), track);
    }

    /// Builder-style registration for synchronous setup
    pub fn with_track(mut self, id: impl Into<String>, track: LoadedTrack) -> Self {
        self.tracks.get_mut().insert(id.into(), track);
        self
    }
}

#[async_trait]
impl TrackLoader for MemoryTrackLoader {
    async fn fetch(&self, descriptor: &TrackDescriptor) -> Result<LoadedTrack> {
        let id = descriptor.id.as_deref().unwrap_or_default();
        self.tracks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::load(id, "no payload registered"))
    }
}
