//! Track selection
//!
//! Picks the enabled track(s) from the available sources. Precedence, first
//! non-empty rule wins:
//! 1. preferred language and kind, smallest id among several matches
//! 2. fallback language (English by default), any kind
//! 3. first source in list order
//! 4. nothing (no tracks is a valid state)
//!
//! Failed sources never qualify.

use crate::source::TrackSource;
use crate::types::{LayoutMode, LoadState, Preferences, TrackKind};
use std::sync::Arc;

/// Deterministic automatic track selection
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    fallback_language: String,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new("en")
    }
}

impl SelectionPolicy {
    pub fn new(fallback_language: impl Into<String>) -> Self {
        Self {
            fallback_language: fallback_language.into().to_lowercase(),
        }
    }

    /// Ordered ids of the sources to enable
    pub fn select_enabled(&self, sources: &[Arc<TrackSource>], prefs: &Preferences) -> Vec<String> {
        let eligible = || {
            sources
                .iter()
                .filter(|s| s.load_state() != LoadState::Failed)
        };

        let preferred = eligible()
            .filter(|s| s.language().eq_ignore_ascii_case(&prefs.language) && s.kind() == prefs.kind)
            .min_by(|a, b| a.id().cmp(b.id()));
        let fallback = || eligible().find(|s| s.language() == self.fallback_language);
        let first = || eligible().next();

        preferred
            .or_else(fallback)
            .or_else(first)
            .map(|s| vec![s.id().to_string()])
            .unwrap_or_default()
    }
}

/// Enabled sources and the user's standing preference
#[derive(Debug, Clone)]
pub struct SelectionState {
    enabled: Vec<String>,
    current_language: Option<String>,
    preferred_language: String,
    preferred_kind: TrackKind,
}

impl SelectionState {
    /// Start from persisted preferences with nothing enabled
    pub fn new(prefs: &Preferences) -> Self {
        Self {
            enabled: Vec::new(),
            current_language: None,
            preferred_language: prefs.language.to_lowercase(),
            preferred_kind: prefs.kind,
        }
    }

    /// Enabled source ids, in order
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    pub fn is_enabled(&self, source_id: &str) -> bool {
        self.enabled.iter().any(|id| id == source_id)
    }

    /// Language of the most recently enabled source
    pub fn current_language(&self) -> Option<&str> {
        self.current_language.as_deref()
    }

    pub fn preferred_language(&self) -> &str {
        &self.preferred_language
    }

    pub fn preferred_kind(&self) -> TrackKind {
        self.preferred_kind
    }

    /// Replace the enabled set with an automatic selection
    pub fn replace(&mut self, enabled: Vec<String>, sources: &[Arc<TrackSource>]) {
        self.current_language = enabled
            .last()
            .and_then(|id| sources.iter().find(|s| s.id() == id))
            .map(|s| s.language().to_string());
        self.enabled = enabled;
    }

    /// Enable exactly `source`, adopting its language and kind as preferences
    pub fn choose(&mut self, source: &TrackSource) {
        self.enabled = vec![source.id().to_string()];
        self.current_language = Some(source.language().to_string());
        if !source.language().is_empty() {
            self.preferred_language = source.language().to_string();
        }
        if source.kind() != TrackKind::Uncategorized {
            self.preferred_kind = source.kind();
        }
    }

    /// Drop an id from the enabled set
    pub fn disable(&mut self, source_id: &str) {
        self.enabled.retain(|id| id != source_id);
    }

    /// Preferences view for persistence, combined with the layout owner's mode
    pub fn preferences(&self, layout: LayoutMode) -> Preferences {
        Preferences {
            language: self.preferred_language.clone(),
            kind: self.preferred_kind,
            layout,
        }
    }
}

/// Bucket sources by kind, in order of first appearance
pub fn group_by_kind(sources: &[Arc<TrackSource>]) -> Vec<(TrackKind, Vec<Arc<TrackSource>>)> {
    let mut groups: Vec<(TrackKind, Vec<Arc<TrackSource>>)> = Vec::new();
    for source in sources {
        match groups.iter_mut().find(|(kind, _)| *kind == source.kind()) {
            Some((_, members)) => members.push(Arc::clone(source)),
            None => groups.push((source.kind(), vec![Arc::clone(source)])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryTrackLoader;
    use crate::types::TrackDescriptor;

    fn sources(specs: &[(&str, &str)]) -> Vec<Arc<TrackSource>> {
        let loader = Arc::new(MemoryTrackLoader::new());
        specs
            .iter()
            .map(|(lang, kind)| {
                let descriptor = TrackDescriptor::new(*lang, *kind);
                let id = TrackSource::default_id(&descriptor);
                Arc::new(TrackSource::new(id, descriptor, loader.clone()))
            })
            .collect()
    }

    fn prefs(language: &str, kind: TrackKind) -> Preferences {
        Preferences {
            language: language.to_string(),
            kind,
            layout: LayoutMode::OnTop,
        }
    }

    #[test]
    fn test_preferred_language_and_kind() {
        let list = sources(&[("fr", "SUB"), ("en", "SUB")]);
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.select_enabled(&list, &prefs("en", TrackKind::Subtitles)),
            vec!["en/SUB"]
        );
    }

    #[test]
    fn test_language_match_is_case_insensitive() {
        let list = sources(&[("en", "CC"), ("PT-BR", "SUB")]);
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.select_enabled(&list, &prefs("pt-BR", TrackKind::Subtitles)),
            vec!["pt-br/SUB"]
        );
    }

    #[test]
    fn test_english_fallback_ignores_kind() {
        let list = sources(&[("fr", "SUB"), ("en", "CC")]);
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.select_enabled(&list, &prefs("de", TrackKind::Subtitles)),
            vec!["en/CC"]
        );
    }

    #[test]
    fn test_first_source_fallback() {
        let list = sources(&[("fr", "SUB")]);
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.select_enabled(&list, &prefs("de", TrackKind::Subtitles)),
            vec!["fr/SUB"]
        );
    }

    #[test]
    fn test_no_sources_selects_nothing() {
        let policy = SelectionPolicy::default();
        assert!(policy
            .select_enabled(&[], &prefs("en", TrackKind::Subtitles))
            .is_empty());
    }

    #[test]
    fn test_deterministic_and_order_independent_match() {
        let policy = SelectionPolicy::default();
        let p = prefs("es", TrackKind::Captions);
        let forward = sources(&[("fr", "SUB"), ("es", "CC"), ("en", "SUB")]);
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();

        let first = policy.select_enabled(&forward, &p);
        for _ in 0..5 {
            assert_eq!(policy.select_enabled(&forward, &p), first);
        }
        assert_eq!(policy.select_enabled(&reversed, &p), first);

        // Two sources share language and kind
        let loader = Arc::new(MemoryTrackLoader::new());
        let tied: Vec<Arc<TrackSource>> = ["en-main", "en-alt"]
            .into_iter()
            .map(|id| {
                Arc::new(TrackSource::new(
                    id,
                    TrackDescriptor::new("en", "SUB").with_id(id),
                    loader.clone(),
                ))
            })
            .collect();
        let tied_reversed: Vec<_> = tied.iter().rev().cloned().collect();
        let p = prefs("en", TrackKind::Subtitles);
        assert_eq!(policy.select_enabled(&tied, &p), vec!["en-alt"]);
        assert_eq!(policy.select_enabled(&tied_reversed, &p), vec!["en-alt"]);
    }

    #[test]
    fn test_choose_updates_preferences() {
        let list = sources(&[("fr", "CC")]);
        let mut state = SelectionState::new(&Preferences::default());
        state.choose(&list[0]);

        assert_eq!(state.enabled(), ["fr/CC".to_string()]);
        assert_eq!(state.current_language(), Some("fr"));
        let saved = state.preferences(LayoutMode::Below);
        assert_eq!(saved.language, "fr");
        assert_eq!(saved.kind, TrackKind::Captions);
        assert_eq!(saved.layout, LayoutMode::Below);
    }

    #[test]
    fn test_group_by_kind_keeps_order() {
        let list = sources(&[("fr", "SUB"), ("en", "CC"), ("de", "SUB"), ("it", "")]);
        let groups = group_by_kind(&list);
        let kinds: Vec<TrackKind> = groups.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![TrackKind::Subtitles, TrackKind::Captions, TrackKind::Uncategorized]
        );
        assert_eq!(groups[0].1.len(), 2);
    }
}
