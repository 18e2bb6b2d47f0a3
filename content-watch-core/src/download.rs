use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::contract::{FeedMetadata, FetchError, FetchedSource, Fetcher};
use crate::feed;
use crate::normalize::normalize;
use crate::snapshot::{fingerprint_bytes, fingerprint_entry, Snapshot, TrackedItem};

/// Selects the type of monitored source (repository directory, syndication feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceAction {
    Repo(RepoDirectorySource),
    Feed(FeedSource),
    // Extendable for other source types.
}

/// Describes a monitored directory inside an external repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDirectorySource {
    /// "owner/name" repository slug on the content host.
    pub repository: String,
    /// Directory path within the repository to watch.
    pub directory: String,
    pub reference: Option<String>,
}

/// Describes a monitored syndication feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    /// Position in the configured feed list; part of the state-store key so
    /// each feed keeps independent state.
    pub index: usize,
}

impl SourceAction {
    pub fn logical_name(&self) -> String {
        match self {
            SourceAction::Repo(repo) => format!("{}/{}", repo.repository, repo.directory),
            SourceAction::Feed(feed) => feed.url.clone(),
        }
    }

    /// Deterministic state-store directory name for this source.
    pub fn source_key(&self) -> String {
        match self {
            SourceAction::Repo(repo) => format!("repo_{}_{}", repo.repository, repo.directory)
                .replace('/', "_")
                .replace(':', "_"),
            SourceAction::Feed(feed) => format!("feed_{}", feed.index),
        }
    }
}

/// File extensions worth tracking in a monitored repository directory.
const TRACKED_EXTENSIONS: [&str; 4] = ["md", "markdown", "txt", "json"];

fn should_track(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            TRACKED_EXTENSIONS.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// One entry of a content-host directory listing / file response. The size
/// reported by the host is ignored; the decoded byte length is authoritative.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

/// The contents API answers with a listing for directories and a bare object
/// for single files; both shapes are absorbed here at the boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

/// HttpFetcher talks to the content host's REST API for repository sources and
/// performs plain GETs for feed sources. Everything it needs is passed at
/// construction; it never reads ambient configuration.
pub struct HttpFetcher {
    client: reqwest::Client,
    api_base: String,
    auth_token: Option<String>,
    content_root: PathBuf,
}

impl HttpFetcher {
    pub fn new(
        api_base: impl Into<String>,
        auth_token: Option<String>,
        content_root: impl Into<PathBuf>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("content-watch")
            .build()?;
        Ok(HttpFetcher {
            client,
            api_base: api_base.into(),
            auth_token,
            content_root: content_root.into(),
        })
    }

    fn contents_url(&self, repository: &str, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, repository, path)
    }

    async fn get_contents(
        &self,
        repository: &str,
        path: &str,
        reference: &str,
    ) -> Result<ContentsResponse, FetchError> {
        let url = self.contents_url(repository, path);
        debug!(url = %url, reference, "Fetching contents listing");
        let mut request = self.client.get(&url).query(&[("ref", reference)]);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, url = %url, "Content host returned error: {body}");
            return Err(format!("content host error {status} for {url}").into());
        }
        Ok(response.json::<ContentsResponse>().await?)
    }

    /// Fetch one tracked file: decode its content, fingerprint the raw bytes,
    /// and save a local copy under the source's `files/` subtree.
    async fn fetch_file(
        &self,
        repo: &RepoDirectorySource,
        reference: &str,
        entry_path: &str,
        files_dir: &Path,
    ) -> Result<TrackedItem, FetchError> {
        let fetched = match self.get_contents(&repo.repository, entry_path, reference).await? {
            ContentsResponse::Single(entry) => entry,
            ContentsResponse::Listing(_) => {
                return Err(format!("expected file at {entry_path}, found directory").into())
            }
        };

        let raw = decode_entry_content(&fetched)?;
        let identity = relative_identity(&repo.directory, entry_path);

        let local_path = files_dir.join(&identity);
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&local_path, &raw)?;
        debug!(path = %local_path.display(), bytes = raw.len(), "Saved tracked file locally");

        Ok(TrackedItem::file(
            identity,
            fingerprint_bytes(&raw),
            raw.len() as u64,
            Utc::now(),
        ))
    }

    async fn fetch_repo_directory(
        &self,
        source: &SourceAction,
        repo: &RepoDirectorySource,
    ) -> Result<FetchedSource, FetchError> {
        let reference = repo.reference.as_deref().unwrap_or("main");
        let source_key = source.source_key();
        let files_dir = self.content_root.join(&source_key).join("files");

        let mut snapshot = Snapshot::new();
        let mut pending = vec![repo.directory.clone()];

        while let Some(dir) = pending.pop() {
            let listing = match self.get_contents(&repo.repository, &dir, reference).await {
                Ok(ContentsResponse::Listing(entries)) => entries,
                Ok(ContentsResponse::Single(entry)) => vec![entry],
                Err(e) => {
                    // A vanished or forbidden subdirectory should not sink the
                    // whole scan, but a failure at the monitored root should.
                    if dir == repo.directory {
                        return Err(e);
                    }
                    warn!(directory = %dir, error = %e, "Could not access subdirectory, skipping");
                    continue;
                }
            };

            for entry in listing {
                match entry.kind.as_str() {
                    "dir" => pending.push(entry.path),
                    "file" if should_track(&entry.path) => {
                        match self.fetch_file(repo, reference, &entry.path, &files_dir).await {
                            Ok(item) => {
                                snapshot.insert(item.identity.clone(), item);
                            }
                            Err(e) => {
                                warn!(path = %entry.path, error = %e, "Could not fetch file, skipping");
                            }
                        }
                    }
                    "file" => debug!(path = %entry.path, "Skipping untracked file type"),
                    other => debug!(path = %entry.path, kind = other, "Skipping entry"),
                }
            }
        }

        info!(
            repository = %repo.repository,
            directory = %repo.directory,
            files = snapshot.len(),
            "Scanned repository directory"
        );
        Ok(FetchedSource {
            logical_name: source.logical_name(),
            source_key,
            snapshot,
            feed: None,
        })
    }

    async fn fetch_feed(
        &self,
        source: &SourceAction,
        feed_source: &FeedSource,
    ) -> Result<FetchedSource, FetchError> {
        info!(url = %feed_source.url, "Fetching feed");
        let response = self.client.get(&feed_source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(status = %status, url = %feed_source.url, "Feed fetch returned error status");
            return Err(format!("feed fetch error {status} for {}", feed_source.url).into());
        }
        let bytes = response.bytes().await?;
        let parsed = feed::parse(&bytes)?;

        let now = Utc::now();
        let mut snapshot = Snapshot::new();
        for entry in &parsed.entries {
            if entry.id.is_empty() {
                debug!(title = %entry.title, "Skipping feed entry without id or link");
                continue;
            }
            let body = normalize(&entry.body);
            let item = TrackedItem {
                identity: entry.id.clone(),
                content_fingerprint: fingerprint_entry(&entry.title, &entry.link, &body),
                size: body.len() as u64,
                first_seen: now.to_rfc3339(),
                title: Some(entry.title.clone()),
                link: Some(entry.link.clone()),
                published: if entry.published.is_empty() {
                    None
                } else {
                    Some(entry.published.clone())
                },
                content: Some(body),
            };
            snapshot.insert(item.identity.clone(), item);
        }

        info!(url = %feed_source.url, entries = snapshot.len(), "Parsed feed");
        Ok(FetchedSource {
            logical_name: source.logical_name(),
            source_key: source.source_key(),
            snapshot,
            feed: Some(FeedMetadata {
                feed_title: parsed.title,
                feed_link: parsed.link,
                feed_description: parsed.description,
                feed_url: feed_source.url.clone(),
                feed_index: feed_source.index,
                last_updated: now.to_rfc3339(),
                total_entries: parsed.entries.len(),
            }),
        })
    }
}

fn decode_entry_content(entry: &ContentEntry) -> Result<Vec<u8>, FetchError> {
    let content = entry
        .content
        .as_deref()
        .ok_or_else(|| format!("no content returned for {}", entry.path))?;
    match entry.encoding.as_deref() {
        Some("base64") | None => {
            // The host wraps base64 payloads at 60 columns.
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| format!("invalid base64 content for {}: {e}", entry.path))?)
        }
        Some(other) => Err(format!("unsupported content encoding {other} for {}", entry.path).into()),
    }
}

fn relative_identity(monitored_directory: &str, entry_path: &str) -> String {
    let prefix = format!("{}/", monitored_directory.trim_end_matches('/'));
    entry_path
        .strip_prefix(&prefix)
        .unwrap_or(entry_path)
        .to_string()
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_source(&self, source: &SourceAction) -> Result<FetchedSource, FetchError> {
        match source {
            SourceAction::Repo(repo) => self.fetch_repo_directory(source, repo).await,
            SourceAction::Feed(feed_source) => self.fetch_feed(source, feed_source).await,
        }
    }
}
