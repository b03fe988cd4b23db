//! School Insights - content analytics for a school's backend
//!
//! A CLI tool that signs in to the school's REST backend, fetches the
//! news, events and gallery collections and reports activity insights
//! and dashboard stats.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, session, etc.)
//!   2 - Nothing published inside the window (with --fail-if-stale)

mod analysis;
mod api;
mod cli;
mod config;
mod models;
mod report;
mod session;

use analysis::{InsightSources, InsightsOutcome, SourceState};
use anyhow::{Context, Result};
use api::{ApiClient, ClientConfig, LoginRequest};
use chrono::Local;
use cli::{Args, Command, InsightsArgs, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Category, SchoolProfile};
use session::{Session, SessionStore};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("School Insights v{}", env!("CARGO_PKG_VERSION"));
    debug!("Output format: {:?}", args.format);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the API URL, default range and session path.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so reports on stdout can be piped.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Everything a command needs, resolved once at startup.
struct App {
    args: Args,
    config: Config,
    store: SessionStore,
    session: Session,
}

impl App {
    /// Token from --token / SCHOOL_API_TOKEN, else the stored session.
    fn token(&self) -> Option<String> {
        self.args.token.clone().or_else(|| self.session.token.clone())
    }

    fn client(&self, token: Option<String>) -> Result<ApiClient> {
        ApiClient::new(ClientConfig {
            base_url: self.config.api.base_url.clone(),
            timeout_seconds: self.config.api.timeout_seconds,
            token,
        })
        .context("Failed to create API client")
    }

    fn require_token(&self) -> Result<String> {
        self.token()
            .filter(|t| !t.is_empty())
            .context("Not signed in. Run `school-insights login` first.")
    }

    /// Print the rendered output or write it to --output.
    fn emit(&self, content: &str) -> Result<()> {
        match self.args.output {
            Some(ref path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                if !self.args.quiet {
                    eprintln!("✅ Report saved to: {}", path.display());
                }
            }
            None => print!("{}", content),
        }
        Ok(())
    }
}

/// Dispatch the selected command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let store = config.session_store();
    let session = store.load();
    debug!(
        "Session {} ({})",
        store.path().display(),
        if session.is_authenticated() {
            "signed in"
        } else {
            "anonymous"
        }
    );

    let command = args.command();
    let app = App {
        args,
        config,
        store,
        session,
    };

    match command {
        Command::Insights(insights) => run_insights(&app, &insights).await,
        Command::Stats => run_stats(&app).await,
        Command::Login {
            school_code,
            password,
        } => run_login(&app, school_code, password).await,
        Command::Logout => run_logout(&app),
        Command::Profile => run_profile(&app).await,
        Command::Features { enable, disable } => run_features(&app, &enable, &disable).await,
    }
}

fn spinner(app: &App, message: &str) -> ProgressBar {
    if app.args.quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Fetch the three collections behind a single combined spinner.
async fn fetch_sources(app: &App, client: &ApiClient, limit: u32) -> InsightSources {
    let pb = spinner(app, "Loading news, events and gallery...");

    let sources = client.fetch_sources(limit).await;
    pb.finish_and_clear();

    if Category::ALL
        .iter()
        .all(|c| matches!(sources.get(*c), SourceState::Failed(_)))
    {
        warn!(
            "No collection could be fetched from {}; reporting empty data",
            client.base_url()
        );
    }

    sources
}

/// `insights`: aggregate and render the content insights.
async fn run_insights(app: &App, opts: &InsightsArgs) -> Result<i32> {
    let client = app.client(app.token())?;
    let settings = &app.config.insights;

    info!(
        "Building insights for the last {} days from {}",
        settings.range_days.days(),
        client.base_url()
    );

    let sources = fetch_sources(app, &client, app.config.api.fetch_limit).await;

    let insights = match analysis::aggregate(
        &sources,
        settings.range_days,
        Local::now(),
        settings.recent_limit,
    ) {
        InsightsOutcome::Ready(insights) => insights,
        InsightsOutcome::Loading => anyhow::bail!("Content sources did not finish loading"),
    };

    let output = match app.args.format {
        OutputFormat::Json => report::generate_json_report(&insights, settings.view)?,
        OutputFormat::Markdown => report::generate_markdown_report(&insights, settings.view),
        OutputFormat::Text => report::generate_text_report(&insights, settings.view),
    };
    app.emit(&output)?;

    if opts.fail_if_stale && insights.window_total() == 0 {
        eprintln!(
            "\n⛔ Nothing was published in the last {} days (exit code 2).",
            settings.range_days.days()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Fresh profile from the backend, falling back to the stored one.
async fn current_profile(app: &App, client: &ApiClient) -> SchoolProfile {
    match client.school_profile().await {
        Ok(profile) => profile,
        Err(e) if e.is_auth() => {
            warn!("Session rejected, run `school-insights login` again: {}", e);
            app.session.profile()
        }
        Err(e) => {
            warn!("Could not refresh school profile, using stored one: {}", e);
            app.session.profile()
        }
    }
}

/// Persist a refreshed profile when the session came from `login`.
fn remember_profile(app: &App, profile: &SchoolProfile) -> Result<()> {
    if let Some(ref token) = app.session.token {
        app.store.save(&Session::new(token.clone(), profile.clone()))?;
    }
    Ok(())
}

/// `stats`: dashboard stat cards for the enabled features.
async fn run_stats(app: &App) -> Result<i32> {
    let client = app.client(app.token())?;

    let profile = if app.token().is_some() {
        current_profile(app, &client).await
    } else {
        app.session.profile()
    };

    let sources = fetch_sources(app, &client, 1).await;
    let hero = analysis::build_hero_stats(&profile, &sources);

    let output = match app.args.format {
        OutputFormat::Json => report::generate_stats_json(&hero)?,
        OutputFormat::Markdown => report::generate_stats_markdown(&hero),
        OutputFormat::Text => report::generate_stats_text(&hero),
    };
    app.emit(&output)?;

    Ok(0)
}

/// `login`: sign in, pick up the feature toggles and store the session.
async fn run_login(app: &App, school_code: String, password: String) -> Result<i32> {
    let client = app.client(None)?;
    let data = client
        .login(&LoginRequest {
            school_code,
            password,
        })
        .await
        .context("Login failed. Please check your credentials.")?;

    let (token, mut profile) = data.into_profile();

    match app.client(Some(token.clone()))?.school_profile().await {
        Ok(fresh) => profile = fresh,
        Err(e) => warn!("Signed in, but the school profile could not be loaded: {}", e),
    }

    app.store.save(&Session::new(token, profile.clone()))?;

    println!("✅ Signed in as {}.", profile.display_name());
    println!("   Session stored at {}", app.store.path().display());
    Ok(0)
}

/// `logout`: forget the stored session.
fn run_logout(app: &App) -> Result<i32> {
    if app.store.clear()? {
        println!("✅ Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(0)
}

fn format_features(profile: &SchoolProfile) -> String {
    Category::ALL
        .iter()
        .map(|c| {
            let state = if profile.features.is_enabled(*c) {
                "on"
            } else {
                "off"
            };
            format!("{}: {}", c, state)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_profile(app: &App, profile: &SchoolProfile) -> Result<()> {
    let output = match app.args.format {
        OutputFormat::Json => serde_json::to_string_pretty(profile)? + "\n",
        OutputFormat::Markdown | OutputFormat::Text => {
            let mut out = format!("{}\n", profile.display_name());
            if let Some(id) = profile.identifier() {
                out.push_str(&format!("  Id:       {}\n", id));
            }
            if let Some(ref code) = profile.school_code {
                out.push_str(&format!("  Code:     {}\n", code));
            }
            out.push_str(&format!("  Features: {}\n", format_features(profile)));
            out
        }
    };
    app.emit(&output)
}

/// `profile`: refresh and show the signed-in school.
async fn run_profile(app: &App) -> Result<i32> {
    let client = app.client(Some(app.require_token()?))?;

    let profile = client
        .school_profile()
        .await
        .context("Failed to load school profile")?;
    remember_profile(app, &profile)?;

    render_profile(app, &profile)?;
    Ok(0)
}

/// `features`: toggle content features for the school.
async fn run_features(app: &App, enable: &[Category], disable: &[Category]) -> Result<i32> {
    let client = app.client(Some(app.require_token()?))?;

    let profile = client
        .toggle_features(enable, disable)
        .await
        .context("Failed to update features")?;
    remember_profile(app, &profile)?;

    println!("✅ Features updated: {}", format_features(&profile));
    Ok(0)
}
