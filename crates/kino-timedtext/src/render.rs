//! Caption render reconciliation
//!
//! The scheduler keeps the authoritative map of what is on screen and, each
//! clock tick, diffs it against the cues active at the new time:
//! - active but not displayed: add
//! - displayed but not active: remove, as a hard cut when the same tick
//!   added something, otherwise with a fade-out
//! - in both: untouched
//!
//! Seeks need no special handling since the diff only looks at the interval
//! query for the new time.

use crate::layout::{CaptionStyle, LayoutPolicy};
use crate::types::{Cue, CueKey, LayoutMode, StyleDescriptor, SurfaceSize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Surface-issued handle of a rendered caption
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// How a caption leaves the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Immediate,
    Fade(Duration),
}

/// Trait for caption rendering surfaces
pub trait RenderSurface: Send {
    /// Show a caption and return its handle; the surface fades it in
    fn add_caption(
        &mut self,
        source_id: &str,
        cue_id: &str,
        content: &str,
        style: &CaptionStyle,
    ) -> RenderHandle;

    /// Take a caption off the surface
    fn remove_caption(&mut self, handle: RenderHandle, removal: Removal);

    /// Apply a style to every visible caption
    fn restyle_all(&mut self, style: &StyleDescriptor);
}

/// A cue that should be visible this tick
#[derive(Debug, Clone)]
pub struct ActiveCue<'a> {
    pub key: CueKey,
    pub cue: &'a Cue,
    /// The cue's named style, resolved against its source
    pub style: Option<&'a StyleDescriptor>,
}

/// Render instructions issued by one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub added: Vec<CueKey>,
    /// Removed with a hard cut
    pub removed: Vec<CueKey>,
    /// Removed with a fade-out
    pub faded: Vec<CueKey>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.faded.is_empty()
    }
}

/// Diff-based caption scheduler
#[derive(Debug)]
pub struct RenderScheduler {
    displayed: BTreeMap<CueKey, RenderHandle>,
    fade: Duration,
}

impl RenderScheduler {
    /// Create a scheduler whose fade-outs last `fade`
    pub fn new(fade: Duration) -> Self {
        Self {
            displayed: BTreeMap::new(),
            fade,
        }
    }

    /// Bring the surface in line with `active`
    pub fn reconcile(
        &mut self,
        active: &[ActiveCue<'_>],
        layout: &LayoutPolicy,
        size: SurfaceSize,
        surface: &mut dyn RenderSurface,
    ) -> TickReport {
        if layout.mode() == LayoutMode::Off {
            return self.clear(surface);
        }

        let mut report = TickReport::default();
        let wanted: BTreeSet<&CueKey> = active.iter().map(|entry| &entry.key).collect();

        for entry in active {
            if self.displayed.contains_key(&entry.key) {
                continue;
            }
            let style = layout.caption_style(entry.style, size);
            let handle = surface.add_caption(
                &entry.key.source_id,
                &entry.key.cue_id,
                &entry.cue.content,
                &style,
            );
            self.displayed.insert(entry.key.clone(), handle);
            report.added.push(entry.key.clone());
        }

        let stale: Vec<CueKey> = self
            .displayed
            .keys()
            .filter(|key| !wanted.contains(key))
            .cloned()
            .collect();

        let removal = if report.added.is_empty() {
            Removal::Fade(self.fade)
        } else {
            Removal::Immediate
        };

        for key in stale {
            if let Some(handle) = self.displayed.remove(&key) {
                surface.remove_caption(handle, removal);
                match removal {
                    Removal::Immediate => report.removed.push(key),
                    Removal::Fade(_) => report.faded.push(key),
                }
            }
        }

        if !report.is_empty() {
            debug!(
                added = report.added.len(),
                removed = report.removed.len(),
                faded = report.faded.len(),
                displayed = self.displayed.len(),
                "Captions reconciled"
            );
        }

        report
    }

    /// Remove every displayed caption without fading
    pub fn clear(&mut self, surface: &mut dyn RenderSurface) -> TickReport {
        let mut report = TickReport::default();
        for (key, handle) in std::mem::take(&mut self.displayed) {
            surface.remove_caption(handle, Removal::Immediate);
            report.removed.push(key);
        }
        report
    }

    /// Keys currently on screen
    pub fn displayed(&self) -> impl Iterator<Item = &CueKey> {
        self.displayed.keys()
    }

    pub fn is_displayed(&self, key: &CueKey) -> bool {
        self.displayed.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.displayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }
}

// =============================================================================
// Recording Surface
// =============================================================================

/// One call made against a render surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderInstruction {
    Add {
        handle: RenderHandle,
        source_id: String,
        cue_id: String,
        content: String,
        style: CaptionStyle,
    },
    Remove {
        handle: RenderHandle,
        removal: Removal,
    },
    Restyle {
        style: StyleDescriptor,
    },
}

#[derive(Debug, Default)]
struct Recording {
    next_handle: u64,
    log: Vec<RenderInstruction>,
    visible: BTreeMap<RenderHandle, CueKey>,
}

/// Headless surface that records every instruction
///
/// Clones share the same recording, so a host can hand one clone to the
/// engine and inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recording) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard)
    }

    /// Every instruction issued so far
    pub fn instructions(&self) -> Vec<RenderInstruction> {
        self.with(|r| r.log.clone())
    }

    /// Drain the instruction log
    pub fn take_instructions(&self) -> Vec<RenderInstruction> {
        self.with(|r| std::mem::take(&mut r.log))
    }

    /// Keys of the captions currently on the surface, sorted
    pub fn visible(&self) -> Vec<CueKey> {
        let mut keys: Vec<CueKey> = self.with(|r| r.visible.values().cloned().collect());
        keys.sort();
        keys
    }
}

impl RenderSurface for RecordingSurface {
    fn add_caption(
        &mut self,
        source_id: &str,
        cue_id: &str,
        content: &str,
        style: &CaptionStyle,
    ) -> RenderHandle {
        self.with(|r| {
            r.next_handle += 1;
            let handle = RenderHandle(r.next_handle);
            r.visible.insert(handle, CueKey::new(source_id, cue_id));
            r.log.push(RenderInstruction::Add {
                handle,
                source_id: source_id.to_string(),
                cue_id: cue_id.to_string(),
                content: content.to_string(),
                style: style.clone(),
            });
            handle
        })
    }

    fn remove_caption(&mut self, handle: RenderHandle, removal: Removal) {
        self.with(|r| {
            r.visible.remove(&handle);
            r.log.push(RenderInstruction::Remove { handle, removal });
        })
    }

    fn restyle_all(&mut self, style: &StyleDescriptor) {
        self.with(|r| r.log.push(RenderInstruction::Restyle { style: style.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FADE: Duration = Duration::from_millis(250);

    fn active<'a>(cues: &'a [Cue], time: f64) -> Vec<ActiveCue<'a>> {
        cues.iter()
            .filter(|c| c.is_active_at(time))
            .map(|cue| ActiveCue {
                key: CueKey::new("en", &cue.id),
                cue,
                style: None,
            })
            .collect()
    }

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new("A", 4.0, 12.0, "alpha"),
            Cue::new("B", 6.0, 8.0, "beta"),
            Cue::new("C", 15.0, 25.0, "gamma"),
        ]
    }

    #[test]
    fn test_overlapping_addition_leaves_existing() {
        let cues = cues();
        let layout = LayoutPolicy::new(LayoutMode::OnTop, 60);
        let mut surface = RecordingSurface::new();
        let mut scheduler = RenderScheduler::new(FADE);

        let first = scheduler.reconcile(&active(&cues, 5.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(first.added, vec![CueKey::new("en", "A")]);

        let second = scheduler.reconcile(&active(&cues, 6.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(second.added, vec![CueKey::new("en", "B")]);
        assert!(second.removed.is_empty());
        assert!(second.faded.is_empty());
        assert_eq!(surface.instructions().len(), 2);
    }

    #[test]
    fn test_seek_cuts_immediately() {
        let cues = cues();
        let layout = LayoutPolicy::new(LayoutMode::OnTop, 60);
        let mut surface = RecordingSurface::new();
        let mut scheduler = RenderScheduler::new(FADE);

        scheduler.reconcile(&active(&cues, 10.0), &layout, SurfaceSize::default(), &mut surface);
        surface.take_instructions();

        let report = scheduler.reconcile(&active(&cues, 20.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(report.added, vec![CueKey::new("en", "C")]);
        assert_eq!(report.removed, vec![CueKey::new("en", "A")]);
        assert!(report.faded.is_empty());

        let log = surface.instructions();
        assert!(matches!(log[0], RenderInstruction::Add { .. }));
        assert!(matches!(
            log[1],
            RenderInstruction::Remove {
                removal: Removal::Immediate,
                ..
            }
        ));
    }

    #[test]
    fn test_expiry_without_addition_fades() {
        let cues = cues();
        let layout = LayoutPolicy::new(LayoutMode::Below, 60);
        let mut surface = RecordingSurface::new();
        let mut scheduler = RenderScheduler::new(FADE);

        scheduler.reconcile(&active(&cues, 7.0), &layout, SurfaceSize::default(), &mut surface);
        let report = scheduler.reconcile(&active(&cues, 9.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(report.faded, vec![CueKey::new("en", "B")]);
        assert!(matches!(
            surface.instructions().last(),
            Some(RenderInstruction::Remove {
                removal: Removal::Fade(d),
                ..
            }) if *d == FADE
        ));
    }

    #[test]
    fn test_displayed_tracks_active_across_jumps() {
        let cues = cues();
        let layout = LayoutPolicy::new(LayoutMode::OnTop, 60);
        let mut surface = RecordingSurface::new();
        let mut scheduler = RenderScheduler::new(FADE);

        for t in [0.0, 5.0, 7.0, 20.0, 6.5, 13.0, 4.0, 30.0, 7.9, 15.0] {
            let now = active(&cues, t);
            scheduler.reconcile(&now, &layout, SurfaceSize::default(), &mut surface);

            let mut expected: Vec<CueKey> = now.iter().map(|a| a.key.clone()).collect();
            expected.sort();
            let displayed: Vec<CueKey> = scheduler.displayed().cloned().collect();
            assert_eq!(displayed, expected, "displayed diverged at {t}");
            assert_eq!(surface.visible(), expected, "surface diverged at {t}");
        }
    }

    #[test]
    fn test_off_layout_clears_without_fade() {
        let cues = cues();
        let mut layout = LayoutPolicy::new(LayoutMode::OnTop, 60);
        let mut surface = RecordingSurface::new();
        let mut scheduler = RenderScheduler::new(FADE);

        scheduler.reconcile(&active(&cues, 7.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(scheduler.len(), 2);

        layout.select(LayoutMode::Off);
        let report = scheduler.reconcile(&active(&cues, 7.0), &layout, SurfaceSize::default(), &mut surface);
        assert_eq!(report.removed.len(), 2);
        assert!(report.added.is_empty());
        assert!(scheduler.is_empty());
        assert!(surface.visible().is_empty());
    }
}
