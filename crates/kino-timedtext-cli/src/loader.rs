//! Caption file loading - WebVTT and SRT
//!
//! Reads `file://` track sources from disk and parses them into cues and
//! named styles for the engine.
//!
//! WebVTT `STYLE` blocks of the form `::cue(.name) { color: yellow; }` become
//! named styles; a cue whose whole text is wrapped in `<c.name>...</c>`
//! references style `name`.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use kino_timedtext::{Cue, Error, LoadedTrack, StyleDescriptor, TrackDescriptor, TrackLoader};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Caption file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    WebVtt,
    Srt,
}

impl CaptionFormat {
    /// Detect from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "vtt" => Some(CaptionFormat::WebVtt),
            "srt" => Some(CaptionFormat::Srt),
            _ => None,
        }
    }
}

/// Loader reading caption files referenced by `file://` URLs
#[derive(Debug, Default)]
pub struct FileTrackLoader;

impl FileTrackLoader {
    pub fn new() -> Self {
        Self
    }

    async fn read(descriptor: &TrackDescriptor) -> anyhow::Result<LoadedTrack> {
        let src = descriptor.src.as_ref().ok_or_else(|| anyhow!("track has no source"))?;
        let path = src
            .to_file_path()
            .map_err(|_| anyhow!("not a local file: {}", src))?;
        let format = CaptionFormat::from_path(&path)
            .ok_or_else(|| anyhow!("unsupported caption file: {}", path.display()))?;

        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let track = match format {
            CaptionFormat::WebVtt => parse_webvtt(&raw)?,
            CaptionFormat::Srt => parse_srt(&raw)?,
        };
        debug!(
            path = %path.display(),
            cues = track.cues.len(),
            styles = track.styles.len(),
            "Caption file parsed"
        );
        Ok(track)
    }
}

#[async_trait]
impl TrackLoader for FileTrackLoader {
    async fn fetch(&self, descriptor: &TrackDescriptor) -> kino_timedtext::Result<LoadedTrack> {
        let id = descriptor.id.clone().unwrap_or_default();
        Self::read(descriptor).await.map_err(|e| Error::load(id, format!("{:#}", e)))
    }
}

/// Parse a `LANG:KIND:PATH[:TITLE]` track argument
pub fn parse_track_arg(arg: &str) -> anyhow::Result<TrackDescriptor> {
    let mut parts = arg.splitn(4, ':');
    let (Some(lang), Some(kind), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected LANG:KIND:PATH[:TITLE], got '{}'", arg);
    };
    if lang.trim().is_empty() || path.trim().is_empty() {
        bail!("track '{}' needs a language and a path", arg);
    }

    let path = PathBuf::from(path);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    let src = Url::from_file_path(&path).map_err(|_| anyhow!("invalid track path: {}", path.display()))?;

    let mut descriptor = TrackDescriptor::new(lang, kind).with_src(src);
    if let Some(title) = parts.next().filter(|t| !t.trim().is_empty()) {
        descriptor = descriptor.with_label(title);
    }
    Ok(descriptor)
}

// =============================================================================
// WebVTT
// =============================================================================

/// Parse a WebVTT document
pub fn parse_webvtt(input: &str) -> anyhow::Result<LoadedTrack> {
    let input = input.trim_start_matches('\u{feff}');
    let mut lines = input.lines().peekable();

    let header = lines.next().unwrap_or_default();
    if !header.starts_with("WEBVTT") {
        bail!("invalid WebVTT: missing WEBVTT header");
    }
    // Header metadata runs to the first blank line
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
    }

    let mut track = LoadedTrack::default();
    let mut generated = 0;

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };

        let block_kind = first.split_whitespace().next().unwrap_or_default();
        if matches!(block_kind, "NOTE" | "STYLE" | "REGION") {
            let body = take_block(&mut lines);
            if block_kind == "STYLE" {
                parse_style_block(&body, &mut track.styles);
            }
            continue;
        }

        let (id, timing) = if first.contains("-->") {
            (None, first)
        } else {
            match lines.next() {
                Some(timing) => (Some(first.trim().to_string()), timing),
                None => break,
            }
        };
        if !timing.contains("-->") {
            // Not a cue, skip the rest of the block
            take_block(&mut lines);
            continue;
        }

        let (start, end) = parse_timing_line(timing)?;
        let text = take_block(&mut lines).join("\n");

        generated += 1;
        let id = id.filter(|id| !id.is_empty()).unwrap_or_else(|| generated.to_string());
        track.cues.push(styled_cue(id, start, end, &text));
    }

    Ok(track)
}

fn take_block<'a>(lines: &mut std::iter::Peekable<std::str::Lines<'a>>) -> Vec<&'a str> {
    let mut block = Vec::new();
    while let Some(line) = lines.peek() {
        if line.trim().is_empty() {
            break;
        }
        block.push(*line);
        lines.next();
    }
    block
}

/// Collect `::cue(.name) { ... }` rules into named styles
fn parse_style_block(lines: &[&str], styles: &mut HashMap<String, StyleDescriptor>) {
    let css = lines.join("\n");
    let mut rest = css.as_str();

    while let Some(start) = rest.find("::cue(") {
        rest = &rest[start + "::cue(".len()..];
        let Some(close) = rest.find(')') else { break };
        let selector = rest[..close].trim();
        let Some(open) = rest.find('{') else { break };
        let Some(end) = rest[open..].find('}') else { break };
        let body = &rest[open + 1..open + end];
        rest = &rest[open + end + 1..];

        let Some(name) = selector.strip_prefix('.') else {
            continue;
        };
        let style = styles.entry(name.to_string()).or_default();
        for declaration in body.split(';') {
            if let Some((property, value)) = declaration.split_once(':') {
                let (property, value) = (property.trim(), value.trim());
                if !property.is_empty() && !value.is_empty() {
                    style.set(property, value);
                }
            }
        }
    }
}

/// Build a cue, lifting a whole-text `<c.name>` wrapper into its style id
fn styled_cue(id: String, start: f64, end: f64, text: &str) -> Cue {
    let trimmed = text.trim();
    if let Some(inner) = trimmed.strip_prefix("<c.") {
        if let Some((name, body)) = inner.split_once('>') {
            if let Some(body) = body.strip_suffix("</c>") {
                let name = name.split('.').next().unwrap_or_default();
                if !name.is_empty() && !body.contains("</c>") {
                    return Cue::new(id, start, end, body).with_style(name);
                }
            }
        }
    }
    Cue::new(id, start, end, text)
}

// =============================================================================
// SRT
// =============================================================================

/// Parse a SubRip document
pub fn parse_srt(input: &str) -> anyhow::Result<LoadedTrack> {
    let input = input.trim_start_matches('\u{feff}');
    let mut lines = input.lines().peekable();
    let mut track = LoadedTrack::default();

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let block = take_block(&mut lines);
        if block.is_empty() {
            break;
        }

        let (id, timing, text) = match block.as_slice() {
            [timing, text @ ..] if timing.contains("-->") => (None, *timing, text),
            [id, timing, text @ ..] if timing.contains("-->") => (Some(id.trim()), *timing, text),
            _ => continue,
        };

        let (start, end) = parse_timing_line(timing)?;
        let id = id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| (track.cues.len() + 1).to_string());
        track.cues.push(Cue::new(id, start, end, text.join("\n")));
    }

    Ok(track)
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse `start --> end [settings]`; cue settings are accepted and ignored
fn parse_timing_line(line: &str) -> anyhow::Result<(f64, f64)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| anyhow!("invalid timing line: {}", line))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("missing end time: {}", line))?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm`, with `.` or `,` before the millis
fn parse_timestamp(ts: &str) -> anyhow::Result<f64> {
    let fields: Vec<&str> = ts.split(':').collect();
    let number = |s: &str| -> anyhow::Result<f64> {
        s.replace(',', ".")
            .parse::<f64>()
            .map_err(|_| anyhow!("invalid timestamp: {}", ts))
    };

    match fields.as_slice() {
        [m, s] => Ok(number(*m)? * 60.0 + number(*s)?),
        [h, m, s] => Ok(number(*h)? * 3600.0 + number(*m)? * 60.0 + number(*s)?),
        _ => bail!("invalid timestamp: {}", ts),
    }
}
