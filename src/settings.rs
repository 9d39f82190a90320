//! On-disk settings: user identity and the recent-workspace list.
//!
//! A single JSON document, read through an in-process cache and rewritten
//! wholesale on every update.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Most-recent-first, deduplicated, capped.
const MAX_RECENT_WORKSPACES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub recent_workspaces: Vec<String>,
}

impl Settings {
    /// Both identity fields configured (empty strings do not count)?
    pub fn has_identity(&self) -> bool {
        self.user_name.as_deref().is_some_and(|s| !s.is_empty())
            && self.user_email.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Read-through cached store over the settings document.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    cache: Mutex<Option<Settings>>,
}

impl SettingsStore {
    /// Store at the per-user default location.
    pub fn open_default() -> Self {
        let base = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at_path(base.join(".config").join("kaihistory").join("settings.json"))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Current settings; a missing or unreadable document yields defaults.
    pub fn get(&self) -> Settings {
        let mut cache = self.cache.lock().expect("settings cache lock");
        if let Some(s) = cache.as_ref() {
            return s.clone();
        }
        let loaded = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Settings>(&raw).ok())
            .unwrap_or_default();
        *cache = Some(loaded.clone());
        loaded
    }

    /// Replace the identity fields and persist.
    pub fn update_identity(&self, user_name: &str, user_email: &str) -> io::Result<Settings> {
        let mut next = self.get();
        next.user_name = Some(user_name.to_string());
        next.user_email = Some(user_email.to_string());
        self.write(next.clone())?;
        Ok(next)
    }

    /// Move a workspace path to the front of the recent list and persist.
    pub fn record_recent(&self, path: &str) -> io::Result<Settings> {
        let current = self.get();
        let mut list = vec![path.to_string()];
        list.extend(
            current
                .recent_workspaces
                .iter()
                .filter(|p| p.as_str() != path)
                .cloned(),
        );
        list.truncate(MAX_RECENT_WORKSPACES);
        let next = Settings {
            recent_workspaces: list,
            ..current
        };
        self.write(next.clone())?;
        Ok(next)
    }

    fn write(&self, settings: Settings) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&settings)
            .map_err(|e| io::Error::other(e.to_string()))?;
        std::fs::write(&self.path, body)?;
        *self.cache.lock().expect("settings cache lock") = Some(settings);
        Ok(())
    }
}
