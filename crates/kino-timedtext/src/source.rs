//! Track sources
//!
//! A [`TrackSource`] is one selectable caption/subtitle stream. Its cues are
//! fetched at most once: concurrent `load()` calls join the same attempt and
//! every caller observes the same terminal state.

use crate::error::{Error, Result};
use crate::index::CaptionIndex;
use crate::loader::TrackLoader;
use crate::types::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

/// Cues and styles of a loaded track
#[derive(Debug)]
pub struct LoadedCaptions {
    index: CaptionIndex,
    styles: HashMap<String, StyleDescriptor>,
}

impl LoadedCaptions {
    /// Interval index over the track's cues
    pub fn index(&self) -> &CaptionIndex {
        &self.index
    }

    /// Named style defined by the track
    pub fn style(&self, style_id: &str) -> Option<&StyleDescriptor> {
        self.styles.get(style_id)
    }
}

type LoadOutcome = std::result::Result<Arc<LoadedCaptions>, String>;

/// One available timed text track
pub struct TrackSource {
    id: String,
    language: String,
    kind: TrackKind,
    title: Option<String>,
    descriptor: TrackDescriptor,
    loader: Arc<dyn TrackLoader>,
    /// Set on the first `load()` call
    requested: AtomicBool,
    outcome: OnceCell<LoadOutcome>,
}

impl TrackSource {
    /// Create a source from a host descriptor under the given session-unique id
    pub fn new(id: impl Into<String>, descriptor: TrackDescriptor, loader: Arc<dyn TrackLoader>) -> Self {
        let id = id.into();
        let mut descriptor = descriptor;
        descriptor.id = Some(id.clone());

        Self {
            language: descriptor.srclang.trim().to_lowercase(),
            kind: descriptor
                .kind
                .as_deref()
                .map(TrackKind::from_code)
                .unwrap_or(TrackKind::Uncategorized),
            title: descriptor.label.clone().filter(|t| !t.trim().is_empty()),
            id,
            descriptor,
            loader,
            requested: AtomicBool::new(false),
            outcome: OnceCell::new(),
        }
    }

    /// Default id for a descriptor without one: `lang/KIND`
    pub fn default_id(descriptor: &TrackDescriptor) -> String {
        let kind = descriptor
            .kind
            .as_deref()
            .map(TrackKind::from_code)
            .unwrap_or(TrackKind::Uncategorized);
        let lang = descriptor.srclang.trim().to_lowercase();
        match kind {
            TrackKind::Uncategorized => lang,
            kind => format!("{}/{}", lang, kind.code()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lowercase language tag
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Host descriptor this source was built from
    pub fn descriptor(&self) -> &TrackDescriptor {
        &self.descriptor
    }

    /// Menu label: the title when present, otherwise the language tag
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.language)
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        match self.outcome.get() {
            Some(Ok(_)) => LoadState::Loaded,
            Some(Err(_)) => LoadState::Failed,
            None if self.requested.load(Ordering::Acquire) => LoadState::Loading,
            None => LoadState::NotLoaded,
        }
    }

    /// Reason of a failed load
    pub fn failure(&self) -> Option<&str> {
        match self.outcome.get() {
            Some(Err(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Mark the source as requested without awaiting the fetch
    pub(crate) fn mark_requested(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Load the track's cues
    ///
    /// Joins an in-flight attempt and returns the cached outcome once the
    /// source is loaded or failed.
    #[instrument(skip(self), fields(source = %self.id))]
    pub async fn load(&self) -> Result<()> {
        self.mark_requested();

        match self.outcome.get_or_init(|| self.fetch_and_index()).await {
            Ok(_) => Ok(()),
            Err(reason) => Err(Error::load(&self.id, reason)),
        }
    }

    async fn fetch_and_index(&self) -> LoadOutcome {
        let loaded = self.loader.fetch(&self.descriptor).await.map_err(failure_reason)?;
        let index = CaptionIndex::build(loaded.cues).map_err(|e| {
            warn!(source = %self.id, error = %e, "Rejected track cues");
            failure_reason(e)
        })?;

        info!(
            source = %self.id,
            language = %self.language,
            cues = index.len(),
            "Track loaded"
        );

        Ok(Arc::new(LoadedCaptions {
            index,
            styles: loaded.styles,
        }))
    }

    /// Shared handle to the loaded captions, if loaded
    pub fn snapshot(&self) -> Option<Arc<LoadedCaptions>> {
        match self.outcome.get() {
            Some(Ok(loaded)) => Some(Arc::clone(loaded)),
            _ => None,
        }
    }

    /// Cues in start order, if loaded
    pub fn cues(&self) -> Option<&[Cue]> {
        match self.outcome.get() {
            Some(Ok(loaded)) => Some(loaded.index.cues()),
            _ => None,
        }
    }

    /// Look up a cue by id
    pub fn cue(&self, cue_id: &str) -> Option<&Cue> {
        match self.outcome.get() {
            Some(Ok(loaded)) => loaded.index.cue(cue_id),
            _ => None,
        }
    }

    /// All cues with `start_time <= time < end_time`
    pub fn cues_active_at(&self, time: f64) -> Result<Vec<&Cue>> {
        match self.outcome.get() {
            Some(Ok(loaded)) => Ok(loaded.index.active_at(time)),
            _ => Err(Error::NotLoaded {
                source_id: self.id.clone(),
            }),
        }
    }

    /// Named style defined by this track
    pub fn style_for(&self, style_id: &str) -> Option<&StyleDescriptor> {
        match self.outcome.get() {
            Some(Ok(loaded)) => loaded.style(style_id),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSource")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("load_state", &self.load_state())
            .finish()
    }
}

fn failure_reason(err: Error) -> String {
    match err {
        Error::Load { reason, .. } => reason,
        other => other.to_string(),
    }
}
