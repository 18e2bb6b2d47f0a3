use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::download::SourceAction;

/// Full monitoring run configuration: where state lives and which sources to scan.
///
/// Constructed once at process start (the CLI adapter reads the environment) and
/// passed into the pipeline by reference. Core components never consult ambient
/// configuration themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub content_dir: PathBuf,
    pub sources: Vec<SourceAction>,
}

impl MonitorConfig {
    pub fn trace_loaded(&self) {
        info!(
            content_dir = %self.content_dir.display(),
            sources_count = self.sources.len(),
            "Loaded MonitorConfig"
        );
        debug!(?self, "MonitorConfig loaded (full debug)");
    }
}

/// Retention sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub content_dir: PathBuf,
    /// Items strictly older than this many days are cleanup candidates.
    pub age_threshold_days: i64,
    /// When true, report candidates without mutating any state.
    pub dry_run: bool,
}

impl SweepConfig {
    pub fn trace_loaded(&self) {
        info!(
            content_dir = %self.content_dir.display(),
            age_threshold_days = self.age_threshold_days,
            dry_run = self.dry_run,
            "Loaded SweepConfig"
        );
        debug!(?self, "SweepConfig loaded (full debug)");
    }
}
