//! Persisted sign-in session.
//!
//! The session is read once at startup and handed to whatever needs it;
//! `login` writes it and `logout` removes it.

use crate::models::SchoolProfile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Token and school profile of the signed-in school.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<SchoolProfile>,
}

impl Session {
    pub fn new(token: String, user: SchoolProfile) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().map_or(false, |t| !t.is_empty())
    }

    /// Profile of the signed-in school, or an empty one with every
    /// feature disabled.
    pub fn profile(&self) -> SchoolProfile {
        self.user.clone().unwrap_or_default()
    }
}

/// File-backed session storage.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// A missing file is an anonymous session; an unreadable one is
    /// logged and treated the same way.
    pub fn load(&self) -> Session {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return Session::default();
        }

        match self.read() {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring unreadable session file: {:#}", e);
                Session::default()
            }
        }
    }

    fn read(&self) -> Result<Session> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored session. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchoolFeatures;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("nested").join("session.json"))
    }

    #[test]
    fn test_missing_file_is_anonymous() {
        let dir = TempDir::new().unwrap();
        let session = store(&dir).load();
        assert!(!session.is_authenticated());
        assert!(!session.profile().features.news);
    }

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let profile = SchoolProfile {
            school_name: Some("Hillside".to_string()),
            features: SchoolFeatures {
                news: true,
                events: true,
                gallery: false,
            },
            ..SchoolProfile::default()
        };

        store.save(&Session::new("jwt".to_string(), profile.clone())).unwrap();
        let loaded = store.load();
        assert!(loaded.is_authenticated());
        assert_eq!(loaded.profile(), profile);

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(!store.load().is_authenticated());
    }

    #[test]
    fn test_corrupt_file_is_anonymous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "undefined").unwrap();
        assert_eq!(SessionStore::new(&path).load(), Session::default());
    }
}
