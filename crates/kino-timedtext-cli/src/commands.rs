//! CLI command implementations

use crate::loader::{parse_track_arg, FileTrackLoader};
use crate::output::{print_rows, to_json, OutputFormat};
use crate::surface::ConsoleSurface;
use anyhow::{bail, Context};
use kino_timedtext::{
    CueKey, JsonFilePreferenceStore, LayoutMode, MemoryPreferenceStore, PreferenceStore, RecordingSurface,
    RenderSurface, StaticCapabilities, SurfaceSize, TimedText, TimedTextConfig, TrackDescriptor, TrackKind,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Options shared by every command
pub struct SessionOptions {
    pub tracks: Vec<String>,
    pub prefs: Option<PathBuf>,
    pub offset: f64,
    pub format: OutputFormat,
}

impl SessionOptions {
    fn descriptors(&self) -> anyhow::Result<Vec<TrackDescriptor>> {
        self.tracks.iter().map(String::as_str).map(parse_track_arg).collect()
    }

    fn config(&self) -> TimedTextConfig {
        TimedTextConfig {
            time_offset: self.offset,
            ..Default::default()
        }
    }
}

fn open_store(path: Option<&Path>) -> Arc<dyn PreferenceStore> {
    match path {
        Some(path) => Arc::new(JsonFilePreferenceStore::new(path)),
        None => Arc::new(MemoryPreferenceStore::new()),
    }
}

async fn session(
    opts: &SessionOptions,
    config: TimedTextConfig,
    store: Arc<dyn PreferenceStore>,
    capabilities: Arc<StaticCapabilities>,
    surface: impl RenderSurface + 'static,
) -> anyhow::Result<TimedText> {
    let descriptors = opts.descriptors()?;
    Ok(TimedText::builder(Arc::new(FileTrackLoader::new()), Arc::new(descriptors))
        .config(config)
        .preferences(store)
        .capabilities(capabilities)
        .surface(surface)
        .build()
        .await)
}

// =============================================================================
// tracks
// =============================================================================

#[derive(Serialize, Tabled)]
struct TrackRow {
    #[tabled(rename = "")]
    enabled: &'static str,
    id: String,
    language: String,
    kind: String,
    label: String,
    state: String,
    cues: usize,
}

/// List discovered tracks after loading all of them
pub async fn tracks(opts: &SessionOptions) -> anyhow::Result<()> {
    let timed_text = session(
        opts,
        opts.config(),
        open_store(opts.prefs.as_deref()),
        Arc::new(StaticCapabilities::default()),
        RecordingSurface::new(),
    )
    .await?;

    timed_text.setup_sources().await;
    let sources = timed_text.sources().await;
    for source in &sources {
        if let Err(e) = source.load().await {
            warn!(source = source.id(), error = %e, "Track unavailable");
        }
    }

    let enabled: Vec<String> = timed_text
        .enabled_sources()
        .await
        .iter()
        .map(|s| s.id().to_string())
        .collect();

    let rows: Vec<TrackRow> = sources
        .iter()
        .map(|s| TrackRow {
            enabled: if enabled.iter().any(|id| id == s.id()) { "*" } else { "" },
            id: s.id().to_string(),
            language: s.language().to_string(),
            kind: s.kind().to_string(),
            label: s.label().to_string(),
            state: match s.failure() {
                Some(reason) => format!("failed: {}", reason),
                None => s.load_state().to_string(),
            },
            cues: s.cues().map_or(0, |cues| cues.len()),
        })
        .collect();

    if rows.is_empty() && opts.format == OutputFormat::Text {
        println!("No caption tracks.");
        return Ok(());
    }
    print_rows(&rows, opts.format);
    Ok(())
}

// =============================================================================
// select
// =============================================================================

#[derive(Serialize)]
struct SelectionReport {
    preferred_language: String,
    preferred_kind: TrackKind,
    enabled: Vec<String>,
    current_language: Option<String>,
}

/// Show which track the selection policy enables
pub async fn select(opts: &SessionOptions, lang: Option<String>, kind: Option<String>) -> anyhow::Result<()> {
    // Start from saved preferences, overridden from the command line
    let saved = match &opts.prefs {
        Some(path) => JsonFilePreferenceStore::new(path)
            .load()
            .await
            .with_context(|| format!("reading preferences {}", path.display()))?,
        None => None,
    };
    let mut prefs = saved.unwrap_or_default();
    if let Some(lang) = lang {
        prefs.language = lang.to_lowercase();
    }
    if let Some(kind) = kind {
        prefs.kind = TrackKind::from_code(&kind);
    }

    let store = Arc::new(MemoryPreferenceStore::with_preferences(prefs.clone()));
    let timed_text = session(
        opts,
        opts.config(),
        store,
        Arc::new(StaticCapabilities::default()),
        RecordingSurface::new(),
    )
    .await?;
    let enabled = timed_text.setup_sources().await;

    let report = SelectionReport {
        preferred_language: prefs.language,
        preferred_kind: prefs.kind,
        enabled,
        current_language: timed_text.current_language().await,
    };

    match opts.format {
        OutputFormat::Json => println!("{}", to_json(&report)),
        OutputFormat::Text => {
            println!("Preferred: {} / {}", report.preferred_language, report.preferred_kind);
            match report.enabled.first() {
                Some(id) => {
                    let label = timed_text
                        .source(id)
                        .await
                        .map(|s| s.label().to_string())
                        .unwrap_or_default();
                    println!("Enabled:   {} ({})", id, label);
                }
                None => println!("Enabled:   none"),
            }
        }
    }
    Ok(())
}

// =============================================================================
// at
// =============================================================================

#[derive(Serialize)]
struct CaptionLine {
    source_id: String,
    cue_id: String,
    start: f64,
    end: f64,
    text: String,
}

/// Print the captions active at `time` for the auto-selected track
pub async fn at(opts: &SessionOptions, time: f64) -> anyhow::Result<()> {
    let timed_text = session(
        opts,
        opts.config(),
        open_store(opts.prefs.as_deref()),
        Arc::new(StaticCapabilities::default()),
        RecordingSurface::new(),
    )
    .await?;

    timed_text.setup_sources().await;
    timed_text.tick(time).await;

    let mut lines = Vec::new();
    for CueKey { source_id, cue_id } in timed_text.displayed().await {
        let Some(source) = timed_text.source(&source_id).await else {
            continue;
        };
        if let Some(cue) = source.cue(&cue_id) {
            lines.push(CaptionLine {
                start: cue.start_time,
                end: cue.end_time,
                text: cue.content.clone(),
                source_id,
                cue_id,
            });
        }
    }
    lines.sort_by(|a, b| a.start.total_cmp(&b.start));

    match opts.format {
        OutputFormat::Json => println!("{}", to_json(&lines)),
        OutputFormat::Text if lines.is_empty() => println!("No captions at {:.3}s", time),
        OutputFormat::Text => {
            for line in &lines {
                println!("[{:.3} --> {:.3}] {}#{}", line.start, line.end, line.source_id, line.cue_id);
                println!("{}\n", line.text);
            }
        }
    }
    Ok(())
}

// =============================================================================
// play
// =============================================================================

/// Playback simulation options
pub struct PlayOptions {
    pub from: f64,
    pub to: f64,
    pub step: f64,
    pub layout: Option<LayoutMode>,
    pub no_overlay: bool,
    pub realtime: bool,
    pub size: SurfaceSize,
}

impl PlayOptions {
    /// Reject clock settings that would never reach `to`
    fn validate(&self) -> anyhow::Result<()> {
        if !self.from.is_finite() || !self.to.is_finite() {
            bail!("--from and --to must be finite numbers of seconds");
        }
        if self.step <= 0.0 || !self.step.is_finite() {
            bail!("--step must be a positive number of seconds");
        }
        if self.to < self.from {
            bail!("--to must not be before --from");
        }
        Ok(())
    }
}

/// Simulate playback from `from` to `to`, printing every render instruction
pub async fn play(opts: &SessionOptions, play: PlayOptions) -> anyhow::Result<()> {
    play.validate()?;

    // The tick interval doubles as the fade-out duration
    let config = TimedTextConfig {
        monitor_rate: Duration::from_secs_f64(play.step),
        ..opts.config()
    };
    let capabilities = Arc::new(StaticCapabilities::new(!play.no_overlay));
    let timed_text = session(
        opts,
        config,
        open_store(opts.prefs.as_deref()),
        capabilities,
        ConsoleSurface::new(opts.format),
    )
    .await?;

    if let Some(mode) = play.layout {
        let resolved = timed_text.select_layout(mode).await;
        if resolved != mode {
            info!(requested = %mode, %resolved, "Layout not available");
        }
    }
    timed_text.resize(play.size).await;

    let enabled = timed_text.setup_sources().await;
    if enabled.is_empty() {
        warn!("No caption track enabled");
    }
    let layout = timed_text.layout_mode().await;
    info!(
        tracks = ?enabled,
        %layout,
        from = play.from,
        to = play.to,
        "Playback started"
    );

    let (tx, rx) = mpsc::channel(32);
    let clock = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(play.step));
        let mut step: u64 = 0;
        loop {
            let time = play.from + step as f64 * play.step;
            if time > play.to {
                break;
            }
            if play.realtime {
                interval.tick().await;
            }
            if tx.send(time).await.is_err() {
                break;
            }
            step += 1;
        }
    });

    let ticks = timed_text.drive(rx).await;
    clock.await?;

    info!(ticks, "Playback finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_options(from: f64, to: f64, step: f64) -> PlayOptions {
        PlayOptions {
            from,
            to,
            step,
            layout: None,
            no_overlay: false,
            realtime: false,
            size: SurfaceSize::new(640, 360),
        }
    }

    #[test]
    fn test_play_options_validation() {
        assert!(play_options(0.0, 10.0, 0.25).validate().is_ok());
        assert!(play_options(5.0, 5.0, 1.0).validate().is_ok());

        assert!(play_options(0.0, f64::NAN, 0.25).validate().is_err());
        assert!(play_options(f64::NAN, 10.0, 0.25).validate().is_err());
        assert!(play_options(0.0, f64::INFINITY, 0.25).validate().is_err());
        assert!(play_options(f64::NEG_INFINITY, 10.0, 0.25).validate().is_err());
        assert!(play_options(0.0, 10.0, 0.0).validate().is_err());
        assert!(play_options(0.0, 10.0, f64::NAN).validate().is_err());
        assert!(play_options(10.0, 0.0, 0.25).validate().is_err());
    }
}
