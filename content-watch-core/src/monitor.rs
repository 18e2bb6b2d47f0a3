//! High-level pipeline: orchestrates fetch → reconcile → persist for all sources.
//!
//! This module provides the top-level orchestration logic for one scheduled
//! monitoring run over every configured source. It implements a coordinated
//! pipeline that:
//!   - Fetches each declared source (repository directory or feed) into a
//!     canonical current snapshot via a [`Fetcher`]
//!   - Loads the previous snapshot from the [`SnapshotStore`] (fail-soft: a
//!     missing or corrupt store reads as empty)
//!   - Classifies change with [`reconcile`] and persists the merged snapshot,
//!     the change-set document, and feed metadata
//!   - Aggregates and returns a report of what changed and which sources failed.
//!
//! # Major Types
//! - [`MonitorReport`]: Output report with per-source change sets and summaries
//! - [`SourceOutcome`]: One source's classification result for downstream audit
//!
//! # Error Handling
//! A failed fetch is isolated to its source: it is logged, recorded in the
//! report, and processing continues with the remaining sources. Partial
//! success is the normal outcome of a run, not a fatal error. Persistence
//! failures are logged without undoing the completed reconciliation.
//!
//! # Navigation
//! - Main entrypoint: [`monitor`]

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::contract::{FeedMetadata, Fetcher};
use crate::reconcile::{reconcile, ChangeSet};
use crate::report::{changes_summary, feed_summary};
use crate::snapshot::{carry_forward, SnapshotStore, CHANGES_FILE, FEED_METADATA_FILE};
use crate::sweep::{analyze_ages, AgeAnalysis};

/// One source's result for this run.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub logical_name: String,
    pub source_key: String,
    pub changes: ChangeSet,
    pub summary: String,
    pub feed: Option<FeedMetadata>,
}

/// Aggregated run report.
#[derive(Debug, Default)]
pub struct MonitorReport {
    pub sources: Vec<SourceOutcome>,
    /// Logical names of sources whose fetch failed this run.
    pub failed_sources: Vec<String>,
}

impl MonitorReport {
    pub fn changes_detected(&self) -> bool {
        self.sources.iter().any(|outcome| outcome.changes.has_changes())
    }

    /// Combined human-readable summary of every source that changed.
    pub fn combined_summary(&self) -> String {
        let mut parts = Vec::new();
        for outcome in &self.sources {
            if outcome.changes.has_changes() {
                parts.push(format!("{}:\n{}", outcome.logical_name, outcome.summary));
            }
        }
        parts.join("\n\n")
    }
}

/// Feed change documents carry storage analytics beside the classification.
#[derive(Debug, Serialize)]
struct FeedChangeDocument<'a> {
    #[serde(flatten)]
    changes: &'a ChangeSet,
    cleanup_analysis: &'a AgeAnalysis,
}

/// Entrypoint: run one monitoring pass over all configured sources.
pub async fn monitor<F>(config: &MonitorConfig, fetcher: &F, store: &SnapshotStore) -> MonitorReport
where
    F: Fetcher,
{
    info!(sources = config.sources.len(), "[MONITOR] Starting monitoring run");
    let mut report = MonitorReport::default();

    for source in &config.sources {
        info!(source = ?source, "[MONITOR] Scanning source");
        let fetched = match fetcher.fetch_source(source).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(source = ?source, error = %e, "[MONITOR][ERROR] Fetch failed, skipping source");
                report.failed_sources.push(source.logical_name());
                continue;
            }
        };
        if fetched.snapshot.is_empty() {
            warn!(source_key = %fetched.source_key, "[MONITOR] No content found in source");
        }

        let previous = store.load(&fetched.source_key);
        let changes = reconcile(&previous, &fetched.snapshot);
        let next = carry_forward(&previous, fetched.snapshot);

        if let Err(e) = store.save(&fetched.source_key, &next) {
            error!(
                source_key = %fetched.source_key,
                error = %e,
                "[MONITOR][ERROR] Failed to persist snapshot"
            );
        }

        // The change-set document is written every run, changes or not.
        let write_result = match &fetched.feed {
            Some(_) => {
                let analysis = analyze_ages(&previous, &next, Utc::now());
                store.write_json(
                    &fetched.source_key,
                    CHANGES_FILE,
                    &FeedChangeDocument {
                        changes: &changes,
                        cleanup_analysis: &analysis,
                    },
                )
            }
            None => store.write_json(&fetched.source_key, CHANGES_FILE, &changes),
        };
        if let Err(e) = write_result {
            error!(
                source_key = %fetched.source_key,
                error = %e,
                "[MONITOR][ERROR] Failed to persist change set"
            );
        }

        if let Some(meta) = &fetched.feed {
            if let Err(e) = store.write_json(&fetched.source_key, FEED_METADATA_FILE, meta) {
                error!(
                    source_key = %fetched.source_key,
                    error = %e,
                    "[MONITOR][ERROR] Failed to persist feed metadata"
                );
            }
        }

        let summary = match &fetched.feed {
            Some(_) => feed_summary(&changes, &next),
            None => changes_summary(&changes),
        };
        if changes.has_changes() {
            info!(
                source = %fetched.logical_name,
                new = changes.new_identities.len(),
                updated = changes.updated_identities.len(),
                "[MONITOR] Changes detected"
            );
        } else {
            info!(source = %fetched.logical_name, "[MONITOR] No changes detected");
        }

        report.sources.push(SourceOutcome {
            logical_name: fetched.logical_name,
            source_key: fetched.source_key,
            changes,
            summary,
            feed: fetched.feed,
        });
    }

    info!(
        scanned = report.sources.len(),
        failed = report.failed_sources.len(),
        changes_detected = report.changes_detected(),
        "[MONITOR] Monitoring run complete"
    );
    report
}
