//! User preferences persisted as a small JSON file.
//!
//! Holds the Groq API key, the provider preference and the dark-mode flag.
//! A single `UserPreferences` is created at startup and shared by `Arc`.

use crate::ai::Provider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("Failed to access preferences: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode preferences: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Preferences lock poisoned")]
    Poisoned,
}

fn default_dark_mode() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default)]
    groq_api_key: Option<String>,
    #[serde(default)]
    selected_provider: Option<String>,
    #[serde(default = "default_dark_mode")]
    is_dark_mode: bool,
}

impl Default for StoredPreferences {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            selected_provider: None,
            is_dark_mode: default_dark_mode(),
        }
    }
}

pub struct UserPreferences {
    path: PathBuf,
    state: RwLock<StoredPreferences>,
}

/// `<data_local_dir>/exodus/preferences.json`, or `cache/` when there is no data dir.
pub fn default_preferences_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("exodus").join("preferences.json");
    }
    PathBuf::from("cache").join("preferences.json")
}

impl UserPreferences {
    /// Loads the file if present. A corrupt file is logged and replaced by defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!("invalid preferences at {}: {err}", path.display());
                StoredPreferences::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoredPreferences::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn open_default() -> Result<Self, PreferencesError> {
        Self::open(default_preferences_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn groq_api_key(&self) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.groq_api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn set_groq_api_key(&self, api_key: Option<&str>) -> Result<(), PreferencesError> {
        let key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let cleared = key.is_none();
        self.update(|s| s.groq_api_key = key)?;
        tracing::debug!(
            "Groq API key {}",
            if cleared { "cleared" } else { "saved" }
        );
        Ok(())
    }

    pub fn selected_provider(&self) -> Provider {
        self.state
            .read()
            .ok()
            .and_then(|s| s.selected_provider.clone())
            .map(|name| Provider::from_name(&name))
            .unwrap_or_default()
    }

    pub fn set_selected_provider(&self, provider: Provider) -> Result<(), PreferencesError> {
        self.update(|s| s.selected_provider = Some(provider.name().to_string()))?;
        tracing::debug!("provider selection saved: {}", provider.display_name());
        Ok(())
    }

    pub fn is_dark_mode(&self) -> bool {
        self.state
            .read()
            .map(|s| s.is_dark_mode)
            .unwrap_or_else(|_| default_dark_mode())
    }

    pub fn set_dark_mode(&self, is_dark: bool) -> Result<(), PreferencesError> {
        self.update(|s| s.is_dark_mode = is_dark)
    }

    pub fn clear_all(&self) -> Result<(), PreferencesError> {
        self.update(|s| *s = StoredPreferences::default())?;
        tracing::info!("all preferences cleared");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut StoredPreferences)) -> Result<(), PreferencesError> {
        let snapshot = {
            let mut state = self.state.write().map_err(|_| PreferencesError::Poisoned)?;
            apply(&mut *state);
            state.clone()
        };
        self.persist(&snapshot)
    }

    fn persist(&self, snapshot: &StoredPreferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("exodus-prefs-{}", uuid::Uuid::new_v4()))
            .join("preferences.json")
    }

    #[test]
    fn defaults_when_missing() {
        let prefs = UserPreferences::open(scratch_path()).unwrap();
        assert_eq!(prefs.groq_api_key(), None);
        assert_eq!(prefs.selected_provider(), Provider::Auto);
        assert!(prefs.is_dark_mode());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        let prefs = UserPreferences::open(&path).unwrap();
        assert_eq!(prefs.selected_provider(), Provider::Auto);
    }

    #[test]
    fn unknown_provider_name_reads_as_auto() {
        let path = scratch_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"selected_provider":"CLAUDE"}"#).unwrap();
        let prefs = UserPreferences::open(&path).unwrap();
        assert_eq!(prefs.selected_provider(), Provider::Auto);
        assert!(prefs.is_dark_mode());
    }
}
