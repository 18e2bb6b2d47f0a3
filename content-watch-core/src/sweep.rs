//! Retention sweeping: find and (optionally) remove tracked content past the
//! age threshold.
//!
//! A sweep is a single pass per source: ANALYZE the stored snapshot into
//! cleanup candidates, REPORT them, MUTATE only in destructive mode, and
//! persist the shrunk snapshot only when at least one removal succeeded.
//! Per-item deletion failures are logged and skipped; they never abort the
//! remainder of the sweep.
//!
//! Two age-computation sites exist on purpose and fall back differently for
//! unparseable timestamps: the sweep site treats them as immediately eligible
//! (an unreadable timestamp cannot be trusted as recent), while the
//! monitor-side analytics site treats them as zero days old.

use std::fs;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::SweepConfig;
use crate::snapshot::{Snapshot, SnapshotStore, TrackedItem};

/// An item exceeding the retention threshold, eligible for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupCandidate {
    pub identity: String,
    /// `None` when the item's timestamps could not be parsed; such items are
    /// immediately eligible.
    pub age_days: Option<i64>,
    pub size: u64,
}

/// Per-source sweep result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub source_key: String,
    pub total_items: usize,
    pub total_size: u64,
    pub candidates: Vec<CleanupCandidate>,
    pub removed_count: usize,
    pub bytes_freed: u64,
}

/// Whole-store sweep result.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub sources: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn candidate_count(&self) -> usize {
        self.sources.iter().map(|s| s.candidates.len()).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.sources.iter().map(|s| s.removed_count).sum()
    }

    pub fn bytes_freed(&self) -> u64 {
        self.sources.iter().map(|s| s.bytes_freed).sum()
    }
}

/// Timestamp formats seen in feed `published` fields, beyond RFC 3339/2822.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"];

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// The timestamp an item's retention age is measured from: the feed-provided
/// publication date when present, otherwise first observation.
fn item_date(item: &TrackedItem) -> Option<DateTime<Utc>> {
    if let Some(published) = &item.published {
        if let Some(dt) = parse_timestamp(published) {
            return Some(dt);
        }
    }
    parse_timestamp(&item.first_seen)
}

/// Sweep-site age computation. `None` means unparseable: immediately eligible.
pub fn candidate_age_days(item: &TrackedItem, now: DateTime<Utc>) -> Option<i64> {
    item_date(item).map(|date| (now - date).num_days())
}

/// Monitor-site age computation for feed analytics: unparseable or missing
/// publication dates count as zero days old.
pub fn entry_age_days(item: &TrackedItem, now: DateTime<Utc>) -> i64 {
    item.published
        .as_deref()
        .and_then(parse_timestamp)
        .map(|date| (now - date).num_days())
        .unwrap_or(0)
}

/// Select cleanup candidates: strictly older than the threshold, or with
/// unparseable timestamps.
pub fn cleanup_candidates(
    snapshot: &Snapshot,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Vec<CleanupCandidate> {
    let mut candidates = Vec::new();
    for item in snapshot.values() {
        match candidate_age_days(item, now) {
            Some(age_days) if age_days > threshold_days => candidates.push(CleanupCandidate {
                identity: item.identity.clone(),
                age_days: Some(age_days),
                size: item.size,
            }),
            Some(_) => {}
            None => candidates.push(CleanupCandidate {
                identity: item.identity.clone(),
                age_days: None,
                size: item.size,
            }),
        }
    }
    candidates
}

/// Sweep one source. Dry-run performs zero mutation; destructive mode removes
/// backing artifacts and snapshot entries, persisting only when something was
/// actually removed.
pub fn sweep_source(
    store: &SnapshotStore,
    source_key: &str,
    threshold_days: i64,
    destructive: bool,
    now: DateTime<Utc>,
) -> SweepOutcome {
    let mut snapshot = store.load(source_key);
    let total_items = snapshot.len();
    let total_size: u64 = snapshot.values().map(|item| item.size).sum();
    let candidates = cleanup_candidates(&snapshot, threshold_days, now);

    let mut outcome = SweepOutcome {
        source_key: source_key.to_string(),
        total_items,
        total_size,
        candidates,
        removed_count: 0,
        bytes_freed: 0,
    };

    for candidate in &outcome.candidates {
        match candidate.age_days {
            Some(age) => info!(
                source_key,
                identity = %candidate.identity,
                size = candidate.size,
                age_days = age,
                "[SWEEP] Cleanup candidate"
            ),
            None => info!(
                source_key,
                identity = %candidate.identity,
                size = candidate.size,
                "[SWEEP] Cleanup candidate (unparseable timestamp)"
            ),
        }
    }

    if !destructive {
        return outcome;
    }

    let files_dir = store.files_dir(source_key);
    for candidate in &outcome.candidates {
        let backing = files_dir.join(&candidate.identity);
        if backing.exists() {
            match fs::remove_file(&backing) {
                Ok(()) => {
                    outcome.bytes_freed += candidate.size;
                }
                Err(e) => {
                    error!(
                        source_key,
                        path = %backing.display(),
                        error = ?e,
                        "[SWEEP] Failed to remove backing file, keeping entry"
                    );
                    continue;
                }
            }
        }
        snapshot.remove(&candidate.identity);
        outcome.removed_count += 1;
    }

    if outcome.removed_count > 0 {
        if let Err(e) = store.save(source_key, &snapshot) {
            error!(source_key, error = %e, "[SWEEP] Failed to persist swept snapshot");
        }
    }
    outcome
}

/// Sweep every source with persisted state under the store root.
pub fn sweep_all(store: &SnapshotStore, config: &SweepConfig, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport {
        dry_run: config.dry_run,
        sources: Vec::new(),
    };

    let keys = store.list_source_keys();
    if keys.is_empty() {
        warn!(root = %store.root().display(), "[SWEEP] No stored snapshots found, nothing to sweep");
        return report;
    }

    info!(
        sources = keys.len(),
        age_threshold_days = config.age_threshold_days,
        dry_run = config.dry_run,
        "[SWEEP] Starting retention sweep"
    );
    for key in keys {
        let outcome = sweep_source(
            store,
            &key,
            config.age_threshold_days,
            !config.dry_run,
            now,
        );
        report.sources.push(outcome);
    }

    info!(
        candidates = report.candidate_count(),
        removed = report.removed_count(),
        bytes_freed = report.bytes_freed(),
        dry_run = report.dry_run,
        "[SWEEP] Sweep complete"
    );
    report
}

/// Entry-age histogram over a feed snapshot, for the change report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeDistribution {
    pub last_week: usize,
    pub last_month: usize,
    pub last_quarter: usize,
    pub older: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldestEntry {
    pub identity: String,
    pub title: String,
    pub days_old: i64,
}

/// Storage analytics for a feed source: growth against stored state, age
/// buckets, and the oldest tracked entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeAnalysis {
    pub total_entries: usize,
    pub total_stored: usize,
    pub entry_growth: i64,
    pub entry_age_distribution: AgeDistribution,
    pub oldest_entries: Vec<OldestEntry>,
}

pub fn analyze_ages(previous: &Snapshot, current: &Snapshot, now: DateTime<Utc>) -> AgeAnalysis {
    let mut analysis = AgeAnalysis {
        total_entries: current.len(),
        total_stored: previous.len(),
        entry_growth: current.len() as i64 - previous.len() as i64,
        ..AgeAnalysis::default()
    };

    let mut aged: Vec<OldestEntry> = Vec::with_capacity(current.len());
    for item in current.values() {
        let days_old = entry_age_days(item, now);
        match days_old {
            d if d <= 7 => analysis.entry_age_distribution.last_week += 1,
            d if d <= 30 => analysis.entry_age_distribution.last_month += 1,
            d if d <= 90 => analysis.entry_age_distribution.last_quarter += 1,
            _ => analysis.entry_age_distribution.older += 1,
        }
        let title: String = item
            .title
            .clone()
            .unwrap_or_default()
            .chars()
            .take(50)
            .collect();
        aged.push(OldestEntry {
            identity: item.identity.clone(),
            title,
            days_old,
        });
    }

    aged.sort_by(|a, b| b.days_old.cmp(&a.days_old).then(a.identity.cmp(&b.identity)));
    aged.truncate(10);
    analysis.oldest_entries = aged;
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item_first_seen(identity: &str, first_seen: &str, size: u64) -> TrackedItem {
        TrackedItem {
            identity: identity.to_string(),
            content_fingerprint: "h".to_string(),
            size,
            first_seen: first_seen.to_string(),
            title: None,
            link: None,
            published: None,
            content: None,
        }
    }

    fn snapshot_of(items: Vec<TrackedItem>) -> Snapshot {
        items
            .into_iter()
            .map(|item| (item.identity.clone(), item))
            .collect()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-07-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_common_timestamp_formats() {
        assert!(parse_timestamp("2025-06-01T12:00:00+00:00").is_some());
        assert!(parse_timestamp("2025-06-01T12:00:00Z").is_some());
        assert!(parse_timestamp("Mon, 07 Jul 2025 09:00:00 GMT").is_some());
        assert!(parse_timestamp("2025-06-01 12:00:00").is_some());
        assert!(parse_timestamp("last Tuesday").is_none());
    }

    #[test]
    fn age_equal_to_threshold_is_not_a_candidate() {
        let now = fixed_now();
        let exactly = (now - Duration::days(90)).to_rfc3339();
        let snapshot = snapshot_of(vec![item_first_seen("a.md", &exactly, 10)]);
        assert!(cleanup_candidates(&snapshot, 90, now).is_empty());
    }

    #[test]
    fn age_one_past_threshold_is_a_candidate() {
        let now = fixed_now();
        let over = (now - Duration::days(91)).to_rfc3339();
        let snapshot = snapshot_of(vec![item_first_seen("a.md", &over, 10)]);
        let candidates = cleanup_candidates(&snapshot, 90, now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identity, "a.md");
        assert_eq!(candidates[0].age_days, Some(91));
    }

    #[test]
    fn unparseable_timestamp_is_immediately_eligible() {
        let snapshot = snapshot_of(vec![item_first_seen("a.md", "not-a-date", 10)]);
        let candidates = cleanup_candidates(&snapshot, 90, fixed_now());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].age_days, None);
    }

    #[test]
    fn published_date_is_preferred_over_first_seen() {
        let now = fixed_now();
        let mut item = item_first_seen("entry-1", &now.to_rfc3339(), 10);
        item.published = Some((now - Duration::days(120)).to_rfc3339());
        let snapshot = snapshot_of(vec![item]);

        let candidates = cleanup_candidates(&snapshot, 90, now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].age_days, Some(120));
    }

    #[test]
    fn monitor_site_age_falls_back_to_zero() {
        let now = fixed_now();
        let mut item = item_first_seen("entry-1", &(now - Duration::days(400)).to_rfc3339(), 10);
        item.published = Some("not parseable either".to_string());
        assert_eq!(entry_age_days(&item, now), 0);

        item.published = None;
        assert_eq!(entry_age_days(&item, now), 0);
    }

    #[test]
    fn age_distribution_buckets_entries() {
        let now = fixed_now();
        let mut items = Vec::new();
        for (identity, days) in [("a", 3), ("b", 20), ("c", 60), ("d", 200)] {
            let mut item = item_first_seen(identity, &now.to_rfc3339(), 1);
            item.published = Some((now - Duration::days(days)).to_rfc3339());
            item.title = Some(format!("entry {identity}"));
            items.push(item);
        }
        let analysis = analyze_ages(&Snapshot::new(), &snapshot_of(items), now);

        assert_eq!(analysis.entry_age_distribution.last_week, 1);
        assert_eq!(analysis.entry_age_distribution.last_month, 1);
        assert_eq!(analysis.entry_age_distribution.last_quarter, 1);
        assert_eq!(analysis.entry_age_distribution.older, 1);
        assert_eq!(analysis.total_entries, 4);
        assert_eq!(analysis.entry_growth, 4);
        assert_eq!(analysis.oldest_entries[0].identity, "d");
        assert_eq!(analysis.oldest_entries[0].days_old, 200);
    }

    #[test]
    fn oldest_entries_are_capped_at_ten() {
        let now = fixed_now();
        let items: Vec<TrackedItem> = (0..15)
            .map(|i| {
                let mut item = item_first_seen(&format!("entry-{i:02}"), &now.to_rfc3339(), 1);
                item.published = Some((now - Duration::days(i + 1)).to_rfc3339());
                item
            })
            .collect();
        let analysis = analyze_ages(&Snapshot::new(), &snapshot_of(items), now);
        assert_eq!(analysis.oldest_entries.len(), 10);
        assert_eq!(analysis.oldest_entries[0].days_old, 15);
    }
}
