//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.school-insights.toml` files.

use crate::cli::{Args, Command};
use crate::models::{InsightView, RangeDays};
use crate::session::SessionStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".school-insights.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Insights report settings.
    #[serde(default)]
    pub insights: InsightsConfig,

    /// Session storage settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Items fetched per collection for the insights.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:10000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_fetch_limit() -> u32 {
    100
}

/// Insights report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Trailing window in days: 7, 30 or 90.
    #[serde(default)]
    pub range_days: RangeDays,

    /// Projection the report leads with.
    #[serde(default)]
    pub view: InsightView,

    /// Entries in the recent activity feed.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            range_days: RangeDays::default(),
            view: InsightView::default(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_recent_limit() -> usize {
    crate::analysis::RECENT_ACTIVITY_LIMIT
}

/// Where the sign-in session is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session file path.
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> String {
    ".school-insights-session.json".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment variables) take precedence
    /// over config file settings; unset flags leave the file value alone.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref path) = args.session_file {
            self.session.path = path.display().to_string();
        }

        if let Some(Command::Insights(ref insights)) = args.command {
            if let Some(range) = insights.range {
                self.insights.range_days = range;
            }
            if let Some(view) = insights.view {
                self.insights.view = view;
            }
            if let Some(limit) = insights.limit {
                self.api.fetch_limit = limit;
            }
        }
    }

    /// Reject settings that would make every run fail or report nothing.
    ///
    /// Run after [`Config::merge_with_args`] so file values are checked too.
    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_seconds == 0 {
            anyhow::bail!("api.timeout_seconds must be at least 1");
        }
        if self.api.fetch_limit == 0 {
            anyhow::bail!("api.fetch_limit must be at least 1");
        }
        if self.insights.recent_limit == 0 {
            anyhow::bail!("insights.recent_limit must be at least 1");
        }
        Ok(())
    }

    /// Session store at the configured path.
    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(&self.session.path)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
