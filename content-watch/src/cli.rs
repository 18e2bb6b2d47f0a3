///
/// This module implements the full CLI interface for content-watch—handling
/// command parsing, argument validation, main entrypoints, and user-visible
/// invocations.
///
/// All core business logic (data models, reconciliation, sweeping, extraction)
/// lives in the [`content-watch-core`] crate. This module is strictly for CLI
/// glue, environment adaptation, and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands.
/// - Subcommand routing (`monitor`, `sweep`, `extract`, `validate`, `notify`).
/// - Async entrypoint (`run`) for programmatic invocation and integration
///   testing.
///
/// ## How To Use
/// - For command-line users: use the installed `content-watch` binary with
///   `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// ## Extending
/// When adding features or subcommands, update [`Commands`] below and keep all
/// non-trivial business logic inside `content-watch-core`.
use crate::github::GithubClient;
use crate::load_config;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use content_watch_core::contract::{FeedMetadata, NewTicket, Notifier};
use content_watch_core::download::HttpFetcher;
use content_watch_core::matrix;
use content_watch_core::monitor::monitor;
use content_watch_core::reconcile::ChangeSet;
use content_watch_core::report;
use content_watch_core::schema;
use content_watch_core::snapshot::{SnapshotStore, CHANGES_FILE, FEED_METADATA_FILE};
use content_watch_core::sweep::sweep_all;

/// CLI for content-watch: scheduled monitoring of a repository directory and
/// syndication feeds.
#[derive(Parser)]
#[clap(
    name = "content-watch",
    version,
    about = "Watch a repository directory and syndication feeds for content changes, track state, file update tickets"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan all configured sources, reconcile against stored state, persist
    /// snapshots and change sets
    Monitor,
    /// Report (and with DRY_RUN=false, remove) tracked content older than the
    /// retention threshold
    Sweep,
    /// Extract structured feature records from a markdown matrix document
    Extract {
        /// Path to the markdown matrix file
        #[clap(long)]
        matrix: PathBuf,
        /// Directory the generated JSON documents are written to
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Validate generated feature documents against the JSON schema
    Validate {
        /// Schema file; materialized from the built-in schema when absent
        #[clap(long)]
        schema: Option<PathBuf>,
        /// Directory holding the generated documents
        #[clap(long, default_value = ".")]
        dir: PathBuf,
    },
    /// File a ticket summarising the most recently stored change sets
    Notify,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Monitor => run_monitor().await,
        Commands::Sweep => run_sweep(),
        Commands::Extract { matrix, out_dir } => run_extract(&matrix, &out_dir),
        Commands::Validate { schema, dir } => run_validate(schema, &dir),
        Commands::Notify => run_notify().await,
    }
}

async fn run_monitor() -> Result<()> {
    let env = load_config::monitor_env()?;
    env.config.trace_loaded();

    let store = SnapshotStore::new(&env.config.content_dir);
    let fetcher = HttpFetcher::new(
        &env.api_base,
        Some(env.auth_token.clone()),
        &env.config.content_dir,
    )
    .map_err(|e| anyhow::anyhow!("Failed to construct fetcher: {e}"))?;

    let report = monitor(&env.config, &fetcher, &store).await;

    for outcome in &report.sources {
        tracing::info!(
            source = %outcome.logical_name,
            summary = %outcome.summary,
            "Source scanned"
        );
    }
    for failed in &report.failed_sources {
        tracing::warn!(source = %failed, "Source failed this run");
    }

    if let Some(path) = &env.output_path {
        report::write_ci_output(path, "changes_detected", &report.changes_detected().to_string())
            .with_context(|| format!("Failed to write scheduler output to {}", path.display()))?;
        report::write_ci_output(path, "changes_summary", &report.combined_summary())
            .with_context(|| format!("Failed to write scheduler output to {}", path.display()))?;
    }

    // Per-source fetch failures do not change the exit code; the run as a
    // whole completed.
    tracing::info!(
        changes_detected = report.changes_detected(),
        "Monitoring run finished"
    );
    Ok(())
}

fn run_sweep() -> Result<()> {
    let config = load_config::sweep_env()?;
    config.trace_loaded();

    let store = SnapshotStore::new(&config.content_dir);
    let report = sweep_all(&store, &config, Utc::now());

    if report.candidate_count() == 0 {
        tracing::info!("No old content found, nothing to clean up");
    } else if report.dry_run {
        tracing::info!(
            candidates = report.candidate_count(),
            "Dry run complete; run with DRY_RUN=false to perform the cleanup"
        );
    } else {
        tracing::info!(
            removed = report.removed_count(),
            bytes_freed = report.bytes_freed(),
            "Cleanup completed"
        );
    }
    Ok(())
}

fn run_extract(matrix_path: &PathBuf, out_dir: &PathBuf) -> Result<()> {
    let content = fs::read_to_string(matrix_path)
        .with_context(|| format!("Failed to read matrix file {}", matrix_path.display()))?;
    let matrix_label = matrix_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("feature-matrix.md")
        .to_string();
    let source_url =
        std::env::var("MATRIX_SOURCE_URL").unwrap_or_else(|_| matrix_label.clone());

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let now = Utc::now();
    for section in matrix::default_sections() {
        let document = matrix::extract_document(&content, &section, &source_url, &matrix_label, now);
        let path = out_dir.join(&section.output_file);
        fs::write(&path, serde_json::to_vec_pretty(&document)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(
            platform = %section.platform,
            features = document.features.len(),
            path = %path.display(),
            "Wrote feature document"
        );
    }
    Ok(())
}

fn run_validate(schema_path: Option<PathBuf>, dir: &PathBuf) -> Result<()> {
    let schema_path = schema_path.unwrap_or_else(|| dir.join("schemas/feature-schema.json"));
    schema::ensure_schema_file(&schema_path)?;

    let mut failures = Vec::new();
    for section in matrix::default_sections() {
        let doc_path = dir.join(&section.output_file);
        if !doc_path.exists() {
            tracing::error!(document = %doc_path.display(), "Document not found");
            failures.push(format!("{} not found", doc_path.display()));
            continue;
        }
        match schema::validate_file(&doc_path, &schema_path) {
            Ok(()) => tracing::info!(document = %doc_path.display(), "Schema validation passed"),
            Err(e) => {
                tracing::error!(document = %doc_path.display(), error = %e, "Schema validation failed");
                failures.push(e.to_string());
            }
        }
    }

    if failures.is_empty() {
        tracing::info!("All documents passed schema validation");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "schema validation failed: {}",
            failures.join("; ")
        ))
    }
}

async fn run_notify() -> Result<()> {
    let env = load_config::notify_env()?;
    let store = SnapshotStore::new(&env.content_dir);
    let templates = env
        .templates_dir
        .as_deref()
        .map(report::TicketTemplates::from_dir)
        .unwrap_or_default();

    let mut repo_data: Option<String> = None;
    let mut feed_data: Vec<String> = Vec::new();

    for key in store.list_source_keys() {
        let Some(changes) = store.read_json::<ChangeSet>(&key, CHANGES_FILE) else {
            continue;
        };
        if !changes.has_changes() {
            continue;
        }
        match store.read_json::<FeedMetadata>(&key, FEED_METADATA_FILE) {
            Some(meta) => {
                let snapshot = store.load(&key);
                feed_data.push(report::feed_section_data(&meta, &changes, &snapshot));
            }
            None => {
                repo_data = Some(report::repo_section_data(&env.source_label, &changes));
            }
        }
    }

    if repo_data.is_none() && feed_data.is_empty() {
        tracing::info!("No stored changes detected, skipping ticket creation");
        return Ok(());
    }

    let content = report::ticket_content(
        &templates,
        &Utc::now().to_rfc3339(),
        repo_data,
        feed_data,
    );
    let notifier =
        GithubClient::new_from_env().map_err(|e| anyhow::anyhow!("Failed to construct tracker client: {e}"))?;
    let ticket = notifier
        .create_ticket(NewTicket {
            title: &content.title,
            body: &content.body,
            labels: vec![
                "content-watch".to_string(),
                "feature-matrix".to_string(),
                "automated".to_string(),
            ],
            assignee: env.assignee.as_deref(),
        })
        .await
        .map_err(|e| anyhow::anyhow!("Ticket creation failed: {e}"))?;

    tracing::info!(number = ticket.number, url = %ticket.url, "Ticket created");
    Ok(())
}
