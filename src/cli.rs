//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Category, InsightView, RangeDays};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// School Insights - content analytics for a school's news, events and gallery
///
/// Fetches the school's content from the backend and reports activity over
/// the last 7, 30 or 90 days, plus the dashboard stat cards.
///
/// Examples:
///   school-insights login --school-code HS01
///   school-insights insights --range 7 --view volume
///   school-insights insights --format json --output insights.json
///   school-insights stats
///   school-insights features --enable news,events --disable gallery
///   school-insights --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Backend API base URL
    ///
    /// Defaults to the config file value or http://localhost:10000/api.
    #[arg(long, value_name = "URL", env = "SCHOOL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the stored session
    #[arg(long, env = "SCHOOL_API_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .school-insights.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path of the session file written by `login`
    #[arg(long, value_name = "FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Output format (markdown, json, text)
    #[arg(long, default_value = "markdown", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .school-insights.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Content insights: timeline, split, volume and recent activity (default)
    Insights(InsightsArgs),

    /// Dashboard stat cards for the enabled features
    Stats,

    /// Sign in and store the session
    Login {
        /// School code used to sign in
        #[arg(long, value_name = "CODE")]
        school_code: String,

        /// Account password
        #[arg(long, env = "SCHOOL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Refresh and show the signed-in school's profile
    Profile,

    /// Turn content features on or off for the school
    Features {
        /// Categories to enable (comma-separated)
        #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
        enable: Vec<Category>,

        /// Categories to disable (comma-separated)
        #[arg(long, value_name = "CATEGORIES", value_delimiter = ',')]
        disable: Vec<Category>,
    },
}

#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct InsightsArgs {
    /// Trailing window in days (7, 30 or 90)
    #[arg(short, long, value_name = "DAYS", value_parser = parse_range_days)]
    pub range: Option<RangeDays>,

    /// Projection to lead the report with
    #[arg(long, value_name = "VIEW")]
    pub view: Option<InsightView>,

    /// Items fetched per collection
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<u32>,

    /// Exit with code 2 when nothing was published inside the window
    #[arg(long)]
    pub fail_if_stale: bool,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Plain terminal text
    Text,
}

fn parse_range_days(s: &str) -> Result<RangeDays, String> {
    let days: u32 = s
        .trim()
        .trim_end_matches(['d', 'D'])
        .parse()
        .map_err(|_| format!("'{}' is not a number of days", s))?;
    RangeDays::try_from(days)
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run; bare invocation means `insights`.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Insights(InsightsArgs::default()))
    }

    /// Insights options, if the insights command is selected.
    #[cfg(test)]
    pub fn insights_args(&self) -> Option<InsightsArgs> {
        match self.command() {
            Command::Insights(insights) => Some(insights),
            _ => None,
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match self.command() {
            Command::Insights(insights) => {
                if let Some(limit) = insights.limit {
                    if limit == 0 {
                        return Err("Limit must be at least 1".to_string());
                    }
                }
            }
            Command::Login {
                school_code,
                password,
            } => {
                if school_code.trim().is_empty() {
                    return Err("School code is required".to_string());
                }
                if password.chars().count() < 6 {
                    return Err("Password must be at least 6 characters".to_string());
                }
            }
            Command::Features { enable, disable } => {
                if enable.is_empty() && disable.is_empty() {
                    return Err("Pass --enable and/or --disable".to_string());
                }
                if let Some(both) = enable.iter().find(|c| disable.contains(c)) {
                    return Err(format!("{} cannot be both enabled and disabled", both));
                }
            }
            Command::Stats | Command::Logout | Command::Profile => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
