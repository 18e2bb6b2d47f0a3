//! Change reconciliation: classify the current snapshot against the previous one.
//!
//! This is the heart of the monitoring pipeline. Classification is by stable
//! identity plus content fingerprint:
//!   - identity absent from the previous snapshot: **new**
//!   - identity present with a different fingerprint: **updated**
//!   - identity present with the same fingerprint: **unchanged**
//!
//! Identities present only in the previous snapshot are not reported; the
//! monitored sources are append-mostly and removal detection is out of scope.
//!
//! The caller is expected to feed an *empty* previous snapshot when stored
//! state failed to load, so a corrupted store degrades to "everything is new"
//! instead of aborting the run.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::snapshot::Snapshot;

/// Aggregate statistics over the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub total_items: usize,
    pub total_size: u64,
    /// Rounded mean item size; zero for an empty snapshot.
    pub average_size: u64,
}

/// The output of one reconciliation pass.
///
/// The three identity lists partition the current snapshot's keys: pairwise
/// disjoint, union equal to `keys(current)`. Each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub new_identities: Vec<String>,
    pub updated_identities: Vec<String>,
    pub unchanged_identities: Vec<String>,
    pub stats: SnapshotStats,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.new_identities.is_empty() || !self.updated_identities.is_empty()
    }
}

/// Diff `current` against `previous` and compute aggregate statistics.
///
/// Pure and deterministic: identical inputs always produce identical output.
pub fn reconcile(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (identity, item) in current {
        changes.stats.total_size += item.size;

        match previous.get(identity) {
            None => changes.new_identities.push(identity.clone()),
            Some(prior) if prior.content_fingerprint != item.content_fingerprint => {
                changes.updated_identities.push(identity.clone())
            }
            Some(_) => changes.unchanged_identities.push(identity.clone()),
        }
    }

    changes.stats.total_items = current.len();
    changes.stats.average_size = if current.is_empty() {
        0
    } else {
        (changes.stats.total_size as f64 / current.len() as f64).round() as u64
    };

    info!(
        new = changes.new_identities.len(),
        updated = changes.updated_identities.len(),
        unchanged = changes.unchanged_identities.len(),
        total = changes.stats.total_items,
        "Reconciled snapshot"
    );
    changes
}
