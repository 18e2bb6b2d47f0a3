//! Rendering of change sets into human-readable summaries, ticket bodies and
//! scheduler output lines.
//!
//! Ticket bodies are assembled by `{placeholder}` substitution into text
//! templates. Built-in templates are used unless a template directory provides
//! overrides, so notification wording can change without a rebuild.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::contract::FeedMetadata;
use crate::reconcile::ChangeSet;
use crate::snapshot::Snapshot;

/// One-line pipe-joined summary of a reconciliation, omitting empty buckets.
pub fn changes_summary(changes: &ChangeSet) -> String {
    let mut parts = Vec::new();
    if !changes.new_identities.is_empty() {
        parts.push(format!("New files: {}", changes.new_identities.len()));
    }
    if !changes.updated_identities.is_empty() {
        parts.push(format!("Updated files: {}", changes.updated_identities.len()));
    }
    if !changes.unchanged_identities.is_empty() {
        parts.push(format!("Unchanged files: {}", changes.unchanged_identities.len()));
    }
    parts.push(format!("Total files: {}", changes.stats.total_items));
    parts.join(" | ")
}

/// Multi-line feed summary: new entry titles (up to three) with truncation.
pub fn feed_summary(changes: &ChangeSet, snapshot: &Snapshot) -> String {
    let mut lines = Vec::new();
    let new_count = changes.new_identities.len();
    if new_count > 0 {
        lines.push(format!("New feed entries ({new_count})"));
        for identity in changes.new_identities.iter().take(3) {
            let title = snapshot
                .get(identity)
                .and_then(|item| item.title.clone())
                .unwrap_or_else(|| identity.clone());
            lines.push(format!("  - {title}"));
        }
        if new_count > 3 {
            lines.push(format!("  - ... and {} more", new_count - 3));
        }
    }
    lines.push(format!(
        "Storage: {} entries total, {} new this run",
        changes.stats.total_items, new_count
    ));
    lines.join("\n")
}

/// Format an identity list as markdown bullets with a truncation marker.
pub fn format_list(items: &[String], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = items.iter().take(limit).map(|i| format!("- {i}")).collect();
    if items.len() > limit {
        lines.push(format!("... and {} more files", items.len() - limit));
    }
    lines
}

/// Sanitize a value for a single key=value scheduler output line: newlines
/// collapsed, typographic bullets normalized, non-ASCII replaced.
pub fn safe_output_value(value: &str) -> String {
    value
        .replace(['\n', '\r'], " ")
        .replace('\u{2022}', "-")
        .replace('\u{2026}', "...")
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

/// Append one `key=value` line to the scheduler output file.
pub fn write_ci_output(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}={}", key, safe_output_value(value))?;
    info!(path = %path.display(), key, "Wrote scheduler output");
    Ok(())
}

const DEFAULT_TICKET_TEMPLATE: &str = "\
# Content update review required

Detected: {detection_date}

## Monitoring status

- Repository monitoring: {repo_status}
- Feed monitoring: {feed_status}

{repo_section}{feed_section}";

const DEFAULT_REPO_SECTION_TEMPLATE: &str = "\
## Repository changes

{repo_data}
";

const DEFAULT_FEED_SECTION_TEMPLATE: &str = "\
## Feed updates

{feed_data}
";

/// Ticket text templates with `{placeholder}` slots.
#[derive(Debug, Clone)]
pub struct TicketTemplates {
    pub ticket: String,
    pub repo_section: String,
    pub feed_section: String,
}

impl Default for TicketTemplates {
    fn default() -> Self {
        TicketTemplates {
            ticket: DEFAULT_TICKET_TEMPLATE.to_string(),
            repo_section: DEFAULT_REPO_SECTION_TEMPLATE.to_string(),
            feed_section: DEFAULT_FEED_SECTION_TEMPLATE.to_string(),
        }
    }
}

impl TicketTemplates {
    /// Load templates from a directory, falling back to the built-in text for
    /// any file that is missing or unreadable.
    pub fn from_dir(dir: &Path) -> Self {
        let mut templates = TicketTemplates::default();
        for (file_name, slot) in [
            ("ticket.md", &mut templates.ticket),
            ("repo_section.md", &mut templates.repo_section),
            ("feed_section.md", &mut templates.feed_section),
        ] {
            match fs::read_to_string(dir.join(file_name)) {
                Ok(text) => *slot = text,
                Err(e) => {
                    warn!(template = file_name, error = ?e, "Template not found, using built-in");
                }
            }
        }
        templates
    }
}

/// Rendered ticket, ready for the notifier.
#[derive(Debug, Clone)]
pub struct TicketContent {
    pub title: String,
    pub body: String,
}

/// Build the repository changes section body.
pub fn repo_section_data(source_label: &str, changes: &ChangeSet) -> String {
    let mut lines = vec![format!("**Source:** `{source_label}`"), String::new()];

    if !changes.new_identities.is_empty() {
        lines.push("### New Files:".to_string());
        lines.push(String::new());
        lines.extend(format_list(&changes.new_identities, 10));
        lines.push(String::new());
    }
    if !changes.updated_identities.is_empty() {
        lines.push("### Updated Files:".to_string());
        lines.push(String::new());
        lines.extend(format_list(&changes.updated_identities, 10));
        lines.push(String::new());
    }

    lines.push("### Storage Analysis:".to_string());
    lines.push(format!("- **Total files tracked:** {}", changes.stats.total_items));
    lines.push(format!("- **Files added this run:** {}", changes.new_identities.len()));
    lines.push(format!(
        "- **Files updated this run:** {}",
        changes.updated_identities.len()
    ));
    if changes.stats.average_size > 0 {
        lines.push(format!("- **Average file size:** {} bytes", changes.stats.average_size));
    }
    lines.join("\n")
}

/// Build one feed's section body: new entries with links, then storage totals.
pub fn feed_section_data(meta: &FeedMetadata, changes: &ChangeSet, snapshot: &Snapshot) -> String {
    let display_name = if meta.feed_title.is_empty() {
        format!("Feed {}", meta.feed_index + 1)
    } else {
        meta.feed_title.clone()
    };

    let mut lines = vec![format!("### Feed: {display_name}")];
    if !meta.feed_url.is_empty() {
        lines.push(format!("**Source:** {}", meta.feed_url));
    }
    lines.push(String::new());
    lines.push("**New Entries:**".to_string());
    lines.push(String::new());

    for identity in changes.new_identities.iter().take(5) {
        let Some(item) = snapshot.get(identity) else {
            lines.push(format!("- {identity}"));
            continue;
        };
        let title = item.title.clone().unwrap_or_else(|| identity.clone());
        lines.push(format!("- **{title}**"));
        if let Some(link) = &item.link {
            if !link.is_empty() {
                lines.push(format!("  Link: {link}"));
            }
        }
        if let Some(published) = &item.published {
            lines.push(format!("  Published: {published}"));
        }
    }
    if changes.new_identities.len() > 5 {
        lines.push(format!("... and {} more entries", changes.new_identities.len() - 5));
    }

    lines.push(String::new());
    lines.push("### Storage Analysis:".to_string());
    lines.push(format!("- **Total entries tracked:** {}", changes.stats.total_items));
    lines.push(format!(
        "- **Entries added this run:** {}",
        changes.new_identities.len()
    ));
    lines.join("\n")
}

/// Assemble the full ticket from rendered sections. The title is the first
/// heading of the rendered body.
pub fn ticket_content(
    templates: &TicketTemplates,
    detection_date: &str,
    repo_data: Option<String>,
    feed_data: Vec<String>,
) -> TicketContent {
    let repo_status = if repo_data.is_some() { "Active" } else { "No changes" };
    let feed_status = if feed_data.is_empty() { "No changes" } else { "Active" };

    let repo_section = repo_data
        .map(|data| templates.repo_section.replace("{repo_data}", &data))
        .unwrap_or_default();
    let feed_section = if feed_data.is_empty() {
        String::new()
    } else {
        templates
            .feed_section
            .replace("{feed_data}", &feed_data.join("\n\n"))
    };

    let body = templates
        .ticket
        .replace("{detection_date}", detection_date)
        .replace("{repo_status}", repo_status)
        .replace("{feed_status}", feed_status)
        .replace("{repo_section}", &repo_section)
        .replace("{feed_section}", &feed_section);

    let title = body
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("# "))
        .unwrap_or("Content update review required")
        .to_string();

    TicketContent { title, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::SnapshotStats;
    use crate::snapshot::TrackedItem;
    use chrono::Utc;

    fn change_set(new: &[&str], updated: &[&str], unchanged: &[&str]) -> ChangeSet {
        ChangeSet {
            new_identities: new.iter().map(|s| s.to_string()).collect(),
            updated_identities: updated.iter().map(|s| s.to_string()).collect(),
            unchanged_identities: unchanged.iter().map(|s| s.to_string()).collect(),
            stats: SnapshotStats {
                total_items: new.len() + updated.len() + unchanged.len(),
                total_size: 300,
                average_size: 100,
            },
        }
    }

    #[test]
    fn summary_omits_empty_buckets() {
        let changes = change_set(&["b.md"], &[], &["a.md"]);
        assert_eq!(
            changes_summary(&changes),
            "New files: 1 | Unchanged files: 1 | Total files: 2"
        );
    }

    #[test]
    fn summary_with_no_changes_keeps_total() {
        let changes = change_set(&[], &[], &[]);
        assert_eq!(changes_summary(&changes), "Total files: 0");
    }

    #[test]
    fn list_formatting_truncates() {
        let items: Vec<String> = (0..12).map(|i| format!("f{i}.md")).collect();
        let lines = format_list(&items, 10);
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "- f0.md");
        assert_eq!(lines[10], "... and 2 more files");
    }

    #[test]
    fn output_values_are_single_line_ascii() {
        assert_eq!(
            safe_output_value("New\nfiles \u{2022} one \u{2026} caf\u{e9}"),
            "New files - one ... caf?"
        );
    }

    #[test]
    fn ticket_body_substitutes_sections_and_extracts_title() {
        let changes = change_set(&["b.md"], &["a.md"], &[]);
        let repo = repo_section_data("owner/repo/notes", &changes);
        let ticket = ticket_content(
            &TicketTemplates::default(),
            "2025-07-01T00:00:00+00:00",
            Some(repo),
            Vec::new(),
        );

        assert_eq!(ticket.title, "Content update review required");
        assert!(ticket.body.contains("Detected: 2025-07-01T00:00:00+00:00"));
        assert!(ticket.body.contains("Repository monitoring: Active"));
        assert!(ticket.body.contains("Feed monitoring: No changes"));
        assert!(ticket.body.contains("### New Files:"));
        assert!(ticket.body.contains("- b.md"));
        assert!(ticket.body.contains("- **Average file size:** 100 bytes"));
        assert!(!ticket.body.contains("{repo_section}"));
        assert!(!ticket.body.contains("{feed_section}"));
    }

    #[test]
    fn feed_section_lists_titles_from_snapshot() {
        let mut snapshot = Snapshot::new();
        let mut item = TrackedItem::file("entry-1", "h1".to_string(), 10, Utc::now());
        item.title = Some("Agent mode rollout".to_string());
        item.link = Some("https://example.com/blog/agent-mode".to_string());
        item.published = Some("Mon, 07 Jul 2025 09:00:00 GMT".to_string());
        snapshot.insert("entry-1".to_string(), item);

        let meta = FeedMetadata {
            feed_title: "Release Radar".to_string(),
            feed_url: "https://example.com/feed.xml".to_string(),
            ..FeedMetadata::default()
        };
        let changes = change_set(&["entry-1"], &[], &[]);
        let section = feed_section_data(&meta, &changes, &snapshot);

        assert!(section.contains("### Feed: Release Radar"));
        assert!(section.contains("- **Agent mode rollout**"));
        assert!(section.contains("  Link: https://example.com/blog/agent-mode"));
        assert!(section.contains("- **Entries added this run:** 1"));
    }

    #[test]
    fn feed_summary_truncates_titles() {
        let mut snapshot = Snapshot::new();
        for i in 0..5 {
            let mut item = TrackedItem::file(format!("e{i}"), "h".to_string(), 1, Utc::now());
            item.title = Some(format!("Entry {i}"));
            snapshot.insert(format!("e{i}"), item);
        }
        let changes = change_set(&["e0", "e1", "e2", "e3", "e4"], &[], &[]);
        let summary = feed_summary(&changes, &snapshot);

        assert!(summary.contains("New feed entries (5)"));
        assert!(summary.contains("  - ... and 2 more"));
        assert!(summary.contains("Storage: 5 entries total, 5 new this run"));
    }
}
