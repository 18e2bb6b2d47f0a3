/// `load_config` module: reads the process environment once and adapts it into
/// the strongly-typed configuration structs the core pipeline consumes.
///
/// This module is the only place where ambient environment variables are
/// consulted; every core component receives an explicit config value instead.
///
/// # Responsibilities
/// - Map required environment values to config structs, failing fast with a
///   clear diagnostic before any I/O happens when one is missing
/// - Parse the feed list (a JSON array of URLs) into tagged source actions
/// - Apply the documented defaults: 90-day retention, dry-run on
///
/// # Errors
/// All errors use `anyhow::Error` for context-rich diagnostics, surfaced at
/// the CLI boundary as a non-zero exit.
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::info;

use content_watch_core::config::{MonitorConfig, SweepConfig};
use content_watch_core::download::{FeedSource, RepoDirectorySource, SourceAction};

pub const DEFAULT_CONTENT_DIR: &str = "monitored-content";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} environment variable is required"))
}

fn content_dir_or_default() -> PathBuf {
    PathBuf::from(env::var("LOCAL_CONTENT_DIR").unwrap_or_else(|_| DEFAULT_CONTENT_DIR.to_string()))
}

/// Everything the `monitor` subcommand needs.
#[derive(Debug)]
pub struct MonitorEnv {
    pub config: MonitorConfig,
    pub auth_token: String,
    pub api_base: String,
    /// Scheduler output file (key=value lines), when running under one.
    pub output_path: Option<PathBuf>,
}

pub fn monitor_env() -> Result<MonitorEnv> {
    let repository = required_var("MONITORED_REPO")?;
    let directory = required_var("MONITORED_DIRECTORY")?;
    let auth_token = required_var("GITHUB_TOKEN")?;
    let content_dir = PathBuf::from(required_var("LOCAL_CONTENT_DIR")?);
    let reference = env::var("MONITORED_REF").ok();
    let api_base = env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

    let feeds_raw = env::var("RSS_FEEDS").unwrap_or_else(|_| "[]".to_string());
    let feed_urls: Vec<String> =
        serde_json::from_str(&feeds_raw).context("RSS_FEEDS must be a JSON array of feed URLs")?;

    let mut sources = vec![SourceAction::Repo(RepoDirectorySource {
        repository,
        directory,
        reference,
    })];
    for (index, url) in feed_urls.into_iter().enumerate() {
        sources.push(SourceAction::Feed(FeedSource { url, index }));
    }
    info!(sources = sources.len(), "Monitor configuration assembled from environment");

    Ok(MonitorEnv {
        config: MonitorConfig {
            content_dir,
            sources,
        },
        auth_token,
        api_base,
        output_path: env::var("GITHUB_OUTPUT").ok().map(PathBuf::from),
    })
}

pub fn sweep_env() -> Result<SweepConfig> {
    let age_threshold_days = match env::var("CLEANUP_AGE_DAYS") {
        Ok(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("CLEANUP_AGE_DAYS must be an integer, got {raw:?}"))?,
        Err(_) => 90,
    };
    let dry_run = env::var("DRY_RUN")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(true);

    Ok(SweepConfig {
        content_dir: content_dir_or_default(),
        age_threshold_days,
        dry_run,
    })
}

/// Everything the `notify` subcommand needs besides the tracker credentials,
/// which the client reads itself at construction.
#[derive(Debug)]
pub struct NotifyEnv {
    pub content_dir: PathBuf,
    /// Label for the monitored repository section of the ticket.
    pub source_label: String,
    pub assignee: Option<String>,
    pub templates_dir: Option<PathBuf>,
}

pub fn notify_env() -> Result<NotifyEnv> {
    // The tracker client checks GITHUB_TOKEN / GITHUB_REPOSITORY itself, but
    // requiring the repository here keeps the fail-fast contract: no work
    // starts with broken configuration.
    required_var("GITHUB_REPOSITORY")?;

    let source_label = match (env::var("MONITORED_REPO"), env::var("MONITORED_DIRECTORY")) {
        (Ok(repo), Ok(dir)) => format!("{repo}/{dir}"),
        _ => "monitored repository".to_string(),
    };

    Ok(NotifyEnv {
        content_dir: content_dir_or_default(),
        source_label,
        assignee: env::var("TICKET_ASSIGNEE").ok(),
        templates_dir: env::var("TEMPLATES_DIR").ok().map(PathBuf::from),
    })
}
