//! Markup stripping for free-text bodies.
//!
//! Feed entry bodies arrive as HTML (sometimes with markdown remnants). Before
//! fingerprinting or display they are reduced to plain text: tags removed,
//! inline markdown unwrapped, whitespace collapsed. Pure and deterministic.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BOLD_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.*?)__").unwrap());
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.*?)_").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s*").unwrap());
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip HTML tags and common inline markdown from `raw`, collapsing runs of
/// whitespace to single spaces and trimming the result.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = HTML_TAG.replace_all(raw, "");
    let text = LIST_ITEM.replace_all(&text, "");
    let text = NUMBERED_ITEM.replace_all(&text, "");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_tags() {
        assert_eq!(
            normalize("<p>New <b>agent</b> mode is here</p>"),
            "New agent mode is here"
        );
    }

    #[test]
    fn strips_inline_markdown() {
        assert_eq!(normalize("**bold** and *italic* and `code`"), "bold and italic and code");
        assert_eq!(normalize("__bold__ and _italic_"), "bold and italic");
    }

    #[test]
    fn unwraps_links_keeping_text() {
        assert_eq!(
            normalize("see [release notes](https://example.com/notes) for details"),
            "see release notes for details"
        );
    }

    #[test]
    fn strips_headings_and_list_markers() {
        assert_eq!(
            normalize("## What changed\n- item one\n- item two\n1. first\n2. second"),
            "What changed item one item two first second"
        );
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(normalize("  a \n\n  b\t c  "), "a b c");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn is_deterministic() {
        let raw = "<div># Heading\n**bold** [x](y) text</div>";
        assert_eq!(normalize(raw), normalize(raw));
    }
}
