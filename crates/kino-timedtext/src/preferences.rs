//! Preference persistence
//!
//! User preferences (language, kind, layout) are one small JSON blob. The
//! engine loads it once at startup and saves it after every explicit change.

use crate::error::{Error, Result};
use crate::types::Preferences;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for preference stores
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Previously saved preferences, if any
    async fn load(&self) -> Result<Option<Preferences>>;

    /// Persist preferences
    async fn save(&self, prefs: &Preferences) -> Result<()>;
}

/// Store keeping preferences in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    prefs: RwLock<Option<Preferences>>,
    saves: RwLock<u32>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing preferences
    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            prefs: RwLock::new(Some(prefs)),
            saves: RwLock::new(0),
        }
    }

    /// Number of successful saves
    pub async fn save_count(&self) -> u32 {
        *self.saves.read().await
    }

    /// Last saved preferences
    pub async fn current(&self) -> Option<Preferences> {
        self.prefs.read().await.clone()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self) -> Result<Option<Preferences>> {
        Ok(self.prefs.read().await.clone())
    }

    async fn save(&self, prefs: &Preferences) -> Result<()> {
        *self.prefs.write().await = Some(prefs.clone());
        *self.saves.write().await += 1;
        Ok(())
    }
}

/// Store writing preferences to a JSON file
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn load(&self) -> Result<Option<Preferences>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // An explicit "false" blob means preferences were cleared
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "false" {
            return Ok(None);
        }

        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| Error::Preferences(format!("{}: {}", self.path.display(), e)))
    }

    async fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }
}
