//! Tolerant RSS 2.0 / Atom parsing into a canonical entry shape.
//!
//! External feed payloads are normalized here, at the ingestion boundary, so
//! downstream code never branches on wire shape. Both dialects map onto the
//! same [`FeedEntry`]: the entry id falls back to the link when the feed
//! provides none, and the body is chosen from the richest available content
//! field.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One parsed feed document: channel-level metadata plus entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<FeedEntry>,
}

/// A single feed entry with its raw (un-normalized) body markup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: String,
    pub body: String,
}

#[derive(Debug)]
pub enum FeedError {
    Xml(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Xml(msg) => write!(f, "feed XML parse error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

/// Body candidates in preference order, mirroring how feeds layer their
/// content fields.
#[derive(Debug, Default)]
struct EntryFields {
    id: String,
    title: String,
    link: String,
    published: String,
    content_encoded: String,
    content: String,
    description: String,
    summary: String,
}

impl EntryFields {
    /// Pick the first candidate longer than 200 characters, or failing that
    /// the first non-empty one: short teasers lose to full article bodies.
    fn select_body(&self) -> String {
        let candidates = [
            &self.content_encoded,
            &self.content,
            &self.description,
            &self.summary,
        ];
        if let Some(rich) = candidates.iter().find(|c| c.len() > 200) {
            return rich.to_string();
        }
        candidates
            .iter()
            .find(|c| !c.is_empty())
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    fn build(self) -> FeedEntry {
        let body = self.select_body();
        let id = if self.id.is_empty() {
            self.link.clone()
        } else {
            self.id
        };
        FeedEntry {
            id,
            title: self.title,
            link: self.link,
            published: self.published,
            body,
        }
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn href_attribute(e: &BytesStart<'_>) -> Option<(String, Option<String>)> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"rel" => rel = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    href.map(|h| (h, rel))
}

/// Parse a raw feed document. Parsing is tolerant of unknown elements; an
/// entry without both id and link is still produced here and filtered by the
/// fetch layer, which owns identity rules.
pub fn parse(bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut feed = ParsedFeed::default();
    let mut entry: Option<EntryFields> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = qualified_name(&e);
                if matches!(name.as_str(), "item" | "entry") {
                    entry = Some(EntryFields::default());
                } else if name == "link" {
                    if let Some((href, rel)) = href_attribute(&e) {
                        assign_link(&mut feed, entry.as_mut(), href, rel.as_deref());
                    }
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if qualified_name(&e) == "link" {
                    if let Some((href, rel)) = href_attribute(&e) {
                        assign_link(&mut feed, entry.as_mut(), href, rel.as_deref());
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                record_text(&mut feed, entry.as_mut(), &path, &text);
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                record_text(&mut feed, entry.as_mut(), &path, &text);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if matches!(name.as_str(), "item" | "entry") {
                    if let Some(fields) = entry.take() {
                        feed.entries.push(fields.build());
                    }
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if feed.entries.is_empty() {
        warn!(title = %feed.title, "Feed parsed without any entries");
    }
    Ok(feed)
}

fn assign_link(
    feed: &mut ParsedFeed,
    entry: Option<&mut EntryFields>,
    href: String,
    rel: Option<&str>,
) {
    match entry {
        Some(fields) => {
            // rel="alternate" is the canonical entry page; it wins over
            // whatever href happened to come first.
            if fields.link.is_empty() || rel == Some("alternate") {
                fields.link = href;
            }
        }
        None => {
            if feed.link.is_empty() || rel == Some("alternate") {
                feed.link = href;
            }
        }
    }
}

fn record_text(
    feed: &mut ParsedFeed,
    entry: Option<&mut EntryFields>,
    path: &[String],
    text: &str,
) {
    let Some(element) = path.last() else {
        return;
    };

    if let Some(fields) = entry {
        match element.as_str() {
            "title" => fields.title.push_str(text),
            "link" => {
                if fields.link.is_empty() {
                    fields.link = text.to_string();
                }
            }
            "guid" | "id" => fields.id = text.to_string(),
            "pubDate" | "published" => fields.published = text.to_string(),
            "updated" | "dc:date" => {
                if fields.published.is_empty() {
                    fields.published = text.to_string();
                }
            }
            "content:encoded" => fields.content_encoded.push_str(text),
            "content" => fields.content.push_str(text),
            "description" => fields.description.push_str(text),
            "summary" => fields.summary.push_str(text),
            _ => {}
        }
        return;
    }

    // Channel/feed level: only direct children, so <image><title> and friends
    // do not clobber the channel title.
    let parent = path
        .len()
        .checked_sub(2)
        .map(|i| path[i].as_str());
    if !matches!(parent, Some("channel") | Some("feed")) {
        return;
    }
    match element.as_str() {
        "title" if feed.title.is_empty() => feed.title = text.to_string(),
        "link" if feed.link.is_empty() => feed.link = text.to_string(),
        "description" | "subtitle" if feed.description.is_empty() => {
            feed.description = text.to_string()
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Release Radar</title>
    <link>https://example.com/blog</link>
    <description>Product release announcements</description>
    <item>
      <title>Agent mode rollout</title>
      <link>https://example.com/blog/agent-mode</link>
      <guid>tag:example.com,2025:agent-mode</guid>
      <pubDate>Mon, 07 Jul 2025 09:00:00 GMT</pubDate>
      <description>Short teaser.</description>
      <content:encoded><![CDATA[<p>The <b>agent mode</b> rollout has begun, and this body is deliberately long enough to pass the two-hundred-character preference threshold used when feeds provide both a teaser description and the full article content payload.</p>]]></content:encoded>
    </item>
    <item>
      <title>No guid entry</title>
      <link>https://example.com/blog/no-guid</link>
      <description>Only a description here.</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Changes Feed</title>
  <link rel="alternate" href="https://example.org/changes"/>
  <subtitle>All the changes</subtitle>
  <entry>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <title>New completions model</title>
    <link rel="alternate" href="https://example.org/changes/42"/>
    <updated>2025-06-01T12:00:00Z</updated>
    <summary>A new default completions model.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_channel_and_entries() {
        let feed = parse(RSS_SAMPLE).unwrap();
        assert_eq!(feed.title, "Release Radar");
        assert_eq!(feed.link, "https://example.com/blog");
        assert_eq!(feed.description, "Product release announcements");
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.id, "tag:example.com,2025:agent-mode");
        assert_eq!(first.title, "Agent mode rollout");
        assert_eq!(first.published, "Mon, 07 Jul 2025 09:00:00 GMT");
        assert!(first.body.contains("agent mode"), "long content:encoded should win");
    }

    #[test]
    fn entry_id_falls_back_to_link() {
        let feed = parse(RSS_SAMPLE).unwrap();
        let second = &feed.entries[1];
        assert_eq!(second.id, "https://example.com/blog/no-guid");
        assert_eq!(second.body, "Only a description here.");
    }

    #[test]
    fn parses_atom_entries_with_href_links() {
        let feed = parse(ATOM_SAMPLE).unwrap();
        assert_eq!(feed.title, "Changes Feed");
        assert_eq!(feed.link, "https://example.org/changes");
        assert_eq!(feed.description, "All the changes");
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert_eq!(entry.id, "urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a");
        assert_eq!(entry.link, "https://example.org/changes/42");
        assert_eq!(entry.published, "2025-06-01T12:00:00Z");
        assert_eq!(entry.body, "A new default completions model.");
    }

    #[test]
    fn short_body_candidates_fall_back_in_preference_order() {
        let fields = EntryFields {
            content_encoded: String::new(),
            content: "inline content".to_string(),
            description: "a description".to_string(),
            summary: "a summary".to_string(),
            ..EntryFields::default()
        };
        assert_eq!(fields.select_body(), "inline content");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse(b"<rss><channel><item></rss>").is_err());
    }
}
