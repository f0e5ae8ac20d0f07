//! Timed Text controller - Main orchestrator for caption display
//!
//! Coordinates:
//! - Source discovery and one-shot loading
//! - Automatic and explicit track selection
//! - Layout mode transitions and capability downgrades
//! - Per-tick render reconciliation
//! - Preference persistence and events
//!
//! Lock order is sources, selection, layout, render. No lock is held while a
//! track load is awaited.

use crate::{
    error::Error,
    events::TimedTextEvent,
    host::{HostCapabilities, StaticCapabilities, TrackDiscovery},
    layout::{interface_text_style, LayoutPolicy, LayoutTransition},
    loader::TrackLoader,
    preferences::{MemoryPreferenceStore, PreferenceStore},
    render::{ActiveCue, RecordingSurface, RenderScheduler, RenderSurface, TickReport},
    selection::{group_by_kind, SelectionPolicy, SelectionState},
    source::{LoadedCaptions, TrackSource},
    types::*,
    Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Render-side state, guarded by one lock
struct RenderState {
    scheduler: RenderScheduler,
    surface: Box<dyn RenderSurface>,
    /// Last processed (offset-adjusted) time
    last_time: Option<f64>,
    size: SurfaceSize,
}

/// Builder for [`TimedText`]
pub struct TimedTextBuilder {
    config: TimedTextConfig,
    loader: Arc<dyn TrackLoader>,
    discovery: Arc<dyn TrackDiscovery>,
    capabilities: Arc<dyn HostCapabilities>,
    store: Arc<dyn PreferenceStore>,
    surface: Box<dyn RenderSurface>,
    size: SurfaceSize,
}

impl TimedTextBuilder {
    pub fn config(mut self, config: TimedTextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<dyn HostCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = store;
        self
    }

    pub fn surface(mut self, surface: impl RenderSurface + 'static) -> Self {
        self.surface = Box::new(surface);
        self
    }

    /// Initial interface size
    pub fn size(mut self, size: SurfaceSize) -> Self {
        self.size = size;
        self
    }

    /// Load preferences, apply the host's overlay capability and build the
    /// controller
    pub async fn build(self) -> TimedText {
        let prefs = match self.store.load().await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Preferences::default(),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Failed to load preferences, using defaults");
                Preferences::default()
            }
        };

        let mut layout = LayoutPolicy::new(prefs.layout, self.config.below_bar_height);
        let transition = layout.apply_capability(self.capabilities.supports_overlay_placement());

        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));

        let timed_text = TimedText {
            policy: SelectionPolicy::new(&self.config.default_language),
            render: Mutex::new(RenderState {
                scheduler: RenderScheduler::new(self.config.monitor_rate),
                surface: self.surface,
                last_time: None,
                size: self.size,
            }),
            config: self.config,
            loader: self.loader,
            discovery: self.discovery,
            capabilities: self.capabilities,
            store: self.store,
            sources: RwLock::new(None),
            selection: RwLock::new(SelectionState::new(&prefs)),
            layout: RwLock::new(layout),
            events,
        };

        if let LayoutTransition::Changed { from, to } = transition {
            info!(%from, %to, "Overlay placement unsupported, layout downgraded");
            timed_text.persist().await;
        }

        let layout = timed_text.layout_mode().await;
        info!(
            language = %prefs.language,
            kind = %prefs.kind,
            %layout,
            "Timed text initialized"
        );

        timed_text
    }
}

/// Timed text controller for one player
pub struct TimedText {
    /// Engine configuration
    config: TimedTextConfig,
    /// Automatic selection rules
    policy: SelectionPolicy,
    loader: Arc<dyn TrackLoader>,
    discovery: Arc<dyn TrackDiscovery>,
    capabilities: Arc<dyn HostCapabilities>,
    store: Arc<dyn PreferenceStore>,
    /// Discovered sources, `None` until first setup
    sources: RwLock<Option<Vec<Arc<TrackSource>>>>,
    /// Enabled sources and preferred language/kind
    selection: RwLock<SelectionState>,
    /// Layout mode state machine
    layout: RwLock<LayoutPolicy>,
    /// Displayed captions and the surface they live on
    render: Mutex<RenderState>,
    /// Event broadcaster
    events: broadcast::Sender<TimedTextEvent>,
}

impl TimedText {
    /// Start building a controller
    ///
    /// Defaults: overlays supported, in-memory preferences and a
    /// [`RecordingSurface`].
    pub fn builder(loader: Arc<dyn TrackLoader>, discovery: Arc<dyn TrackDiscovery>) -> TimedTextBuilder {
        TimedTextBuilder {
            config: TimedTextConfig::default(),
            loader,
            discovery,
            capabilities: Arc::new(StaticCapabilities::default()),
            store: Arc::new(MemoryPreferenceStore::new()),
            surface: Box::new(RecordingSurface::new()),
            size: SurfaceSize::default(),
        }
    }

    pub fn config(&self) -> &TimedTextConfig {
        &self.config
    }

    /// Subscribe to timed text events
    pub fn subscribe(&self) -> broadcast::Receiver<TimedTextEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: TimedTextEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Sources
    // =========================================================================

    /// Discover sources (once) and enable the automatic selection
    ///
    /// Returns the enabled source ids. Failed loads are logged and reported
    /// as events; selection moves on to the next eligible source.
    #[instrument(skip(self))]
    pub async fn setup_sources(&self) -> Vec<String> {
        let sources = self.sources_or_discover().await;
        let enabled = self.auto_select(&sources).await;
        self.refresh().await;
        enabled
    }

    /// Forget all sources and run setup again from a fresh discovery
    #[instrument(skip(self))]
    pub async fn reset_sources(&self) -> Vec<String> {
        *self.sources.write().await = None;
        self.selection.write().await.replace(Vec::new(), &[]);
        {
            let mut render = self.render.lock().await;
            let RenderState { scheduler, surface, .. } = &mut *render;
            scheduler.clear(surface.as_mut());
        }
        info!("Timed text sources reset");
        self.setup_sources().await
    }

    /// Explicitly enable one source
    ///
    /// Replaces the enabled set and adopts the source's language and kind as
    /// preferences. Fails with `UnknownSource` for missing or failed ids and
    /// with `Load` when the source cannot be loaded, in which case automatic
    /// selection takes over.
    #[instrument(skip(self))]
    pub async fn select_source(&self, source_id: &str) -> Result<()> {
        let sources = self.sources_or_discover().await;
        let source = sources
            .iter()
            .find(|s| s.id() == source_id && s.load_state() != LoadState::Failed)
            .cloned()
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;

        source.mark_requested();
        self.selection.write().await.choose(&source);
        self.persist().await;

        let enabled = [source.id().to_string()];
        if !self.load_enabled(&sources, &enabled, true).await {
            if self.selection.read().await.enabled().is_empty() {
                self.auto_select(&sources).await;
            }
            self.refresh().await;
            return Err(Error::load(source_id, source.failure().unwrap_or_default()));
        }

        self.refresh().await;
        Ok(())
    }

    async fn sources_or_discover(&self) -> Vec<Arc<TrackSource>> {
        if let Some(sources) = self.sources.read().await.as_ref() {
            return sources.clone();
        }

        let mut guard = self.sources.write().await;
        if let Some(sources) = guard.as_ref() {
            return sources.clone();
        }
        let sources = self.discover();
        *guard = Some(sources.clone());
        sources
    }

    fn discover(&self) -> Vec<Arc<TrackSource>> {
        let descriptors = self.discovery.list_available_tracks();
        let explicit: Vec<Option<String>> = descriptors.iter().map(explicit_id).collect();

        // Host-assigned ids are reserved up front, first occurrence wins
        let mut seen = HashSet::new();
        let first_claim: Vec<bool> = explicit
            .iter()
            .map(|id| id.as_ref().map_or(true, |id| seen.insert(id.clone())))
            .collect();

        let mut sources = Vec::with_capacity(descriptors.len());
        for ((descriptor, explicit), first) in descriptors.into_iter().zip(explicit).zip(first_claim) {
            let id = match explicit {
                Some(id) if !first => {
                    warn!(source = %id, "Dropping track with duplicate id");
                    continue;
                }
                Some(id) => id,
                None => {
                    let id = unique_id(TrackSource::default_id(&descriptor), &seen);
                    seen.insert(id.clone());
                    id
                }
            };
            sources.push(Arc::new(TrackSource::new(id, descriptor, Arc::clone(&self.loader))));
        }

        info!(count = sources.len(), "Timed text sources discovered");
        self.emit(TimedTextEvent::SourcesDiscovered { count: sources.len() });
        sources
    }

    /// Run the selection policy until the enabled set loads or is empty
    async fn auto_select(&self, sources: &[Arc<TrackSource>]) -> Vec<String> {
        loop {
            let enabled = {
                let mut selection = self.selection.write().await;
                let mode = self.layout.read().await.mode();
                let enabled = self.policy.select_enabled(sources, &selection.preferences(mode));
                for id in &enabled {
                    if let Some(source) = find_source(sources, id) {
                        source.mark_requested();
                    }
                }
                selection.replace(enabled.clone(), sources);
                enabled
            };

            if self.load_enabled(sources, &enabled, false).await {
                return enabled;
            }

            // Failed sources drop out of the next pass; stop if another
            // selection already filled the enabled set
            let selection = self.selection.read().await;
            if !selection.enabled().is_empty() {
                return selection.enabled().to_vec();
            }
        }
    }

    /// Await loads of `enabled`, disabling failures. True if all loaded.
    async fn load_enabled(&self, sources: &[Arc<TrackSource>], enabled: &[String], explicit: bool) -> bool {
        let mut all_loaded = true;

        for id in enabled {
            let Some(source) = find_source(sources, id) else {
                continue;
            };

            match source.load().await {
                Ok(()) => {
                    info!(
                        source = %id,
                        language = %source.language(),
                        kind = %source.kind(),
                        explicit,
                        "Timed text source enabled"
                    );
                    self.emit(TimedTextEvent::SourceEnabled {
                        source_id: id.clone(),
                        language: source.language().to_string(),
                        kind: source.kind(),
                        explicit,
                    });
                }
                Err(e) => {
                    warn!(source = %id, error = %e, code = e.error_code(), "Timed text source failed");
                    self.selection.write().await.disable(id);
                    self.emit(TimedTextEvent::SourceFailed {
                        source_id: id.clone(),
                        reason: source.failure().unwrap_or_default().to_string(),
                    });
                    all_loaded = false;
                }
            }
        }

        all_loaded
    }

    /// All discovered sources, in discovery order
    pub async fn sources(&self) -> Vec<Arc<TrackSource>> {
        self.sources.read().await.clone().unwrap_or_default()
    }

    /// Look up a source by id
    pub async fn source(&self, source_id: &str) -> Option<Arc<TrackSource>> {
        self.sources
            .read()
            .await
            .as_deref()
            .and_then(|sources| find_source(sources, source_id))
            .cloned()
    }

    /// Enabled sources, in selection order
    pub async fn enabled_sources(&self) -> Vec<Arc<TrackSource>> {
        let sources = self.sources.read().await;
        let selection = self.selection.read().await;
        let Some(sources) = sources.as_deref() else {
            return Vec::new();
        };
        selection
            .enabled()
            .iter()
            .filter_map(|id| find_source(sources, id))
            .cloned()
            .collect()
    }

    /// Language of the most recently enabled source
    pub async fn current_language(&self) -> Option<String> {
        self.selection.read().await.current_language().map(str::to_string)
    }

    /// Sources in a language, for host menus and transcripts
    pub async fn captions_for_language(&self, language: &str) -> Vec<Arc<TrackSource>> {
        self.sources()
            .await
            .into_iter()
            .filter(|s| s.language().eq_ignore_ascii_case(language.trim()))
            .collect()
    }

    /// Sources bucketed by kind, for grouped menus
    pub async fn sources_by_kind(&self) -> Vec<(TrackKind, Vec<Arc<TrackSource>>)> {
        group_by_kind(&self.sources().await)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    pub async fn layout_mode(&self) -> LayoutMode {
        self.layout.read().await.mode()
    }

    /// Modes the user may pick, in menu order
    pub async fn available_layouts(&self) -> Vec<LayoutMode> {
        self.layout.read().await.available_modes()
    }

    /// User selection of a layout mode, returns the resolved mode
    #[instrument(skip(self))]
    pub async fn select_layout(&self, mode: LayoutMode) -> LayoutMode {
        let transition = self.layout.write().await.select(mode);
        self.apply_layout_transition(transition).await;
        self.layout_mode().await
    }

    /// Re-read the host's overlay capability
    #[instrument(skip(self))]
    pub async fn refresh_capabilities(&self) -> LayoutMode {
        let supported = self.capabilities.supports_overlay_placement();
        let transition = self.layout.write().await.apply_capability(supported);
        if transition.is_changed() {
            info!("Overlay placement unsupported, layout downgraded");
        }
        self.apply_layout_transition(transition).await;
        self.layout_mode().await
    }

    /// Persist a layout change, tear down captions and redraw at the last time
    async fn apply_layout_transition(&self, transition: LayoutTransition) {
        let LayoutTransition::Changed { from, to } = transition else {
            return;
        };

        info!(%from, %to, "Caption layout changed");
        self.emit(TimedTextEvent::LayoutChanged { from, to });
        self.persist().await;

        let last_time = {
            let mut render = self.render.lock().await;
            let RenderState { scheduler, surface, .. } = &mut *render;
            scheduler.clear(surface.as_mut());
            render.last_time
        };
        if let Some(time) = last_time {
            self.reconcile_at(time).await;
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Process a host clock tick at playback time `time`
    pub async fn tick(&self, time: f64) -> TickReport {
        self.reconcile_at(time + self.config.time_offset).await
    }

    /// Consume clock ticks until the channel closes, returns the tick count
    #[instrument(skip(self, ticks))]
    pub async fn drive(&self, mut ticks: mpsc::Receiver<f64>) -> usize {
        let mut count = 0;
        while let Some(time) = ticks.recv().await {
            self.tick(time).await;
            count += 1;
        }
        debug!(ticks = count, "Clock channel closed");
        count
    }

    /// Host interface resized
    #[instrument(skip(self))]
    pub async fn resize(&self, size: SurfaceSize) {
        let mut render = self.render.lock().await;
        render.size = size;
        let style = interface_text_style(size);
        render.surface.restyle_all(&style);
        debug!(width = size.width, height = size.height, "Captions restyled");
    }

    /// Keys of the captions currently displayed
    pub async fn displayed(&self) -> Vec<CueKey> {
        self.render.lock().await.scheduler.displayed().cloned().collect()
    }

    /// Earliest cue boundary after `time` across the enabled sources
    pub async fn next_boundary_after(&self, time: f64) -> Option<f64> {
        let time = time + self.config.time_offset;
        self.enabled_sources()
            .await
            .iter()
            .filter_map(|source| source.snapshot())
            .filter_map(|loaded| loaded.index().next_boundary_after(time))
            .min_by(f64::total_cmp)
            .map(|boundary| boundary - self.config.time_offset)
    }

    async fn refresh(&self) -> TickReport {
        let last_time = self.render.lock().await.last_time;
        match last_time {
            Some(time) => self.reconcile_at(time).await,
            None => TickReport::default(),
        }
    }

    async fn reconcile_at(&self, time: f64) -> TickReport {
        let sources = self.sources().await;
        let enabled = self.selection.read().await.enabled().to_vec();

        // Pin loaded captions before querying; loads finishing now count next tick
        let snapshot: Vec<(String, Arc<LoadedCaptions>)> = enabled
            .iter()
            .filter_map(|id| find_source(&sources, id))
            .filter(|source| source.load_state() == LoadState::Loaded)
            .filter_map(|source| {
                let loaded = source.snapshot();
                debug_assert!(loaded.is_some(), "source {} is Loaded without captions", source.id());
                loaded.map(|loaded| (source.id().to_string(), loaded))
            })
            .collect();

        let active: Vec<ActiveCue<'_>> = snapshot
            .iter()
            .flat_map(|(source_id, loaded)| {
                loaded.index().active_at(time).into_iter().map(move |cue| ActiveCue {
                    key: CueKey::new(source_id.as_str(), cue.id.as_str()),
                    cue,
                    style: cue.style_id.as_deref().and_then(|style_id| loaded.style(style_id)),
                })
            })
            .collect();

        // Layout stays read-locked until the diff is drawn
        let layout = self.layout.read().await;
        let mut render = self.render.lock().await;
        let RenderState {
            scheduler,
            surface,
            last_time,
            size,
        } = &mut *render;
        *last_time = Some(time);
        scheduler.reconcile(&active, &*layout, *size, surface.as_mut())
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// Current preferences as they would be persisted
    pub async fn preferences(&self) -> Preferences {
        let selection = self.selection.read().await;
        let mode = self.layout.read().await.mode();
        selection.preferences(mode)
    }

    async fn persist(&self) {
        let prefs = self.preferences().await;
        if let Err(e) = self.store.save(&prefs).await {
            warn!(error = %e, code = e.error_code(), "Failed to save preferences");
        }
    }
}

fn find_source<'a>(sources: &'a [Arc<TrackSource>], source_id: &str) -> Option<&'a Arc<TrackSource>> {
    sources.iter().find(|s| s.id() == source_id)
}

/// `base`, or `base#n` for the first free n
fn explicit_id(descriptor: &TrackDescriptor) -> Option<String> {
    descriptor
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn unique_id(base: String, seen: &HashSet<String>) -> String {
    if !seen.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}#{}", base, n);
        if !seen.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
