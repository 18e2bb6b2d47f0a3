//! Extraction of structured feature records from a hand-maintained markdown
//! matrix document.
//!
//! The matrix keeps one pipe-delimited table per platform section. Tables are
//! located by heading text, rows are parsed into [`FeatureRecord`]s with
//! status emoji mapped to text labels, and each section becomes one JSON
//! document validated downstream against the feature schema.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

static CELL_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static CELL_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static CELL_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLink {
    pub url: String,
    pub title: String,
    pub feed_source: String,
}

/// One extracted feature row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub feature_capability: String,
    pub category: String,
    pub first_introduced: String,
    pub current_status: String,
    pub latest_update: String,
    pub key_milestones: String,
    pub source_links: Vec<SourceLink>,
    pub detection_date: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub platform: String,
    pub last_updated: String,
    pub generated_by: String,
    pub feed_sources: Vec<String>,
}

/// One generated document: section metadata plus its features, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDocument {
    pub metadata: DocumentMetadata,
    pub features: Vec<FeatureRecord>,
}

/// Where to find one platform's table and where its document goes.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub platform: String,
    /// Heading substrings tried in order; matching is case-insensitive.
    pub heading_patterns: Vec<String>,
    pub output_file: String,
}

pub fn default_sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec {
            platform: "IDE".to_string(),
            heading_patterns: vec![
                "IDE Feature Evolution Timeline".to_string(),
                "IDE Integration Features".to_string(),
            ],
            output_file: "ide-features.json".to_string(),
        },
        SectionSpec {
            platform: "Platform".to_string(),
            heading_patterns: vec![
                "Platform and Agent Evolution Timeline".to_string(),
                "Agent Feature Evolution Timeline".to_string(),
                "Platform Features".to_string(),
            ],
            output_file: "platform-features.json".to_string(),
        },
    ]
}

/// Map a status cell to a text label via its emoji, falling back to whatever
/// word characters the cell holds.
pub fn parse_status(cell: &str) -> String {
    const STATUS_MAP: [(&str, &str); 5] = [
        ("\u{1F7E2}", "Stable"),
        ("\u{1F7E1}", "Preview"),
        ("\u{1F7E0}", "Experimental"),
        ("\u{1F535}", "Rolling Out"),
        ("\u{1F534}", "Deprecated"),
    ];
    for (emoji, label) in STATUS_MAP {
        if cell.contains(emoji) {
            return label.to_string();
        }
    }
    let text: String = cell
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    let text = text.trim();
    if text.is_empty() {
        "Unknown".to_string()
    } else {
        text.to_string()
    }
}

fn clean_cell(cell: &str) -> String {
    let text = CELL_BOLD.replace_all(cell, "$1");
    let text = CELL_ITALIC.replace_all(&text, "$1");
    let text = CELL_LINK.replace_all(&text, "$1");
    text.trim().to_string()
}

fn is_table_row(line: &str) -> bool {
    line.starts_with('|') && line.matches('|').count() >= 3
}

/// Locate the first table under a heading matching any of the given patterns.
/// Returns the table's raw lines, or `None` when no pattern resolves to a
/// table with at least header, separator and one data row.
pub fn extract_table_section(content: &str, patterns: &[String]) -> Option<String> {
    for pattern in patterns {
        let pattern_lower = pattern.to_lowercase();
        let mut lines = content.lines();

        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            if !trimmed.starts_with('#') || !trimmed.to_lowercase().contains(&pattern_lower) {
                continue;
            }

            let mut table_lines = Vec::new();
            for candidate in lines.by_ref() {
                let candidate = candidate.trim();
                if is_table_row(candidate) {
                    table_lines.push(candidate.to_string());
                } else if !table_lines.is_empty() {
                    break;
                } else if candidate.starts_with('#') {
                    // Next section began before any table appeared.
                    break;
                }
            }

            if table_lines.len() >= 3 {
                debug!(pattern = %pattern, rows = table_lines.len(), "Located matrix table");
                return Some(table_lines.join("\n"));
            }
            break;
        }
    }
    None
}

/// Parse a pipe-delimited table into feature records. The first two lines
/// (header and separator) are skipped; rows with fewer than six cells or
/// header-echo feature names are ignored.
pub fn parse_feature_table(
    table: &str,
    platform: &str,
    source_url: &str,
    now: DateTime<Utc>,
) -> Vec<FeatureRecord> {
    let mut features = Vec::new();
    let lines: Vec<&str> = table.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < 3 {
        return features;
    }

    for line in &lines[2..] {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        // Leading and trailing '|' produce empty artifacts on split; interior
        // cells may be legitimately empty and are kept.
        let mut cells: Vec<String> = line.split('|').map(|cell| cell.trim().to_string()).collect();
        if cells.first().is_some_and(|c| c.is_empty()) {
            cells.remove(0);
        }
        if cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        if cells.len() < 6 {
            continue;
        }

        let feature_capability = clean_cell(&cells[0]);
        if feature_capability.is_empty()
            || matches!(
                feature_capability.to_lowercase().as_str(),
                "feature" | "capability" | "feature / capability"
            )
        {
            continue;
        }

        let first_introduced = non_empty_or(clean_cell(&cells[2]), "Unknown");
        let latest_update = non_empty_or(clean_cell(&cells[4]), "Unknown");
        let key_milestones = non_empty_or(clean_cell(&cells[5]), "No specific milestones available");

        features.push(FeatureRecord {
            feature_capability,
            category: clean_cell(&cells[1]),
            first_introduced,
            current_status: parse_status(&cells[3]),
            latest_update,
            key_milestones,
            source_links: vec![SourceLink {
                url: source_url.to_string(),
                title: format!("Feature Matrix - {platform} Features"),
                feed_source: "feature-matrix".to_string(),
            }],
            detection_date: now.to_rfc3339(),
            last_modified: now.to_rfc3339(),
        });
    }
    features
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Extract one section's document from the matrix content. Sections that are
/// missing produce a document with zero features rather than an error.
pub fn extract_document(
    content: &str,
    section: &SectionSpec,
    source_url: &str,
    matrix_label: &str,
    now: DateTime<Utc>,
) -> FeatureDocument {
    let mut features = extract_table_section(content, &section.heading_patterns)
        .map(|table| parse_feature_table(&table, &section.platform, source_url, now))
        .unwrap_or_default();

    features.sort_by(|a, b| b.latest_update.cmp(&a.latest_update));
    info!(
        platform = %section.platform,
        features = features.len(),
        "Extracted feature records"
    );

    FeatureDocument {
        metadata: DocumentMetadata {
            platform: section.platform.clone(),
            last_updated: now.to_rfc3339(),
            generated_by: "automated-extraction".to_string(),
            feed_sources: vec![matrix_label.to_string()],
        },
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX_SAMPLE: &str = "\
# Feature Matrix

Some intro text.

## IDE Feature Evolution Timeline

| Feature / Capability | Category | First Introduced | Status | Latest Update | Key Milestones |
|---|---|---|---|---|---|
| **Inline completions** | Editing | 2023-06 | \u{1F7E2} GA | 2025-03 | [notes](https://example.com/a) expanded models |
| Chat view | Chat | 2023-09 | \u{1F7E1} | 2025-05 | Sidebar chat |
| Feature / Capability | Category | First | Status | Latest | Key |

## Platform and Agent Evolution Timeline

| Feature / Capability | Category | First Introduced | Status | Latest Update | Key Milestones |
|---|---|---|---|---|---|
| Autonomous agent | Agents | 2024-10 | \u{1F535} | 2025-06 |  |
";

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-07-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn status_emoji_maps_to_labels() {
        assert_eq!(parse_status("\u{1F7E2} GA"), "Stable");
        assert_eq!(parse_status("\u{1F7E1}"), "Preview");
        assert_eq!(parse_status("\u{1F7E0} exp"), "Experimental");
        assert_eq!(parse_status("\u{1F535}"), "Rolling Out");
        assert_eq!(parse_status("\u{1F534} old"), "Deprecated");
        assert_eq!(parse_status("Beta!"), "Beta");
        assert_eq!(parse_status("~~~"), "Unknown");
    }

    #[test]
    fn cells_are_cleaned_of_markup() {
        assert_eq!(clean_cell("**Inline completions**"), "Inline completions");
        assert_eq!(clean_cell("*soon*"), "soon");
        assert_eq!(clean_cell("[notes](https://example.com/a) expanded"), "notes expanded");
    }

    #[test]
    fn finds_table_under_matching_heading() {
        let patterns = vec!["IDE Feature Evolution Timeline".to_string()];
        let table = extract_table_section(MATRIX_SAMPLE, &patterns).unwrap();
        assert!(table.starts_with("| Feature / Capability"));
        assert!(table.contains("Inline completions"));
        assert!(!table.contains("Autonomous agent"));
    }

    #[test]
    fn missing_section_yields_none() {
        let patterns = vec!["CLI Features".to_string()];
        assert!(extract_table_section(MATRIX_SAMPLE, &patterns).is_none());
    }

    #[test]
    fn parses_rows_and_skips_header_echoes() {
        let patterns = vec!["IDE Feature Evolution Timeline".to_string()];
        let table = extract_table_section(MATRIX_SAMPLE, &patterns).unwrap();
        let features = parse_feature_table(&table, "IDE", "https://example.com/matrix", now());

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].feature_capability, "Inline completions");
        assert_eq!(features[0].current_status, "Stable");
        assert_eq!(features[0].key_milestones, "notes expanded models");
        assert_eq!(features[1].current_status, "Preview");
    }

    #[test]
    fn document_is_sorted_by_latest_update_descending() {
        let sections = default_sections();
        let doc = extract_document(MATRIX_SAMPLE, &sections[0], "https://example.com/matrix", "feature-matrix.md", now());

        assert_eq!(doc.metadata.platform, "IDE");
        assert_eq!(doc.metadata.generated_by, "automated-extraction");
        assert_eq!(doc.features.len(), 2);
        assert_eq!(doc.features[0].latest_update, "2025-05");
        assert_eq!(doc.features[1].latest_update, "2025-03");
    }

    #[test]
    fn empty_milestone_cell_gets_fallback_text() {
        let sections = default_sections();
        let doc = extract_document(MATRIX_SAMPLE, &sections[1], "https://example.com/matrix", "feature-matrix.md", now());

        assert_eq!(doc.features.len(), 1);
        assert_eq!(doc.features[0].feature_capability, "Autonomous agent");
        assert_eq!(doc.features[0].current_status, "Rolling Out");
        assert_eq!(doc.features[0].key_milestones, "No specific milestones available");
    }

    #[test]
    fn records_serialize_with_camel_case_fields() {
        let sections = default_sections();
        let doc = extract_document(MATRIX_SAMPLE, &sections[0], "https://example.com/matrix", "feature-matrix.md", now());
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json["metadata"]["lastUpdated"].is_string());
        assert!(json["features"][0]["featureCapability"].is_string());
        assert!(json["features"][0]["sourceLinks"][0]["feedSource"].is_string());
    }
}
