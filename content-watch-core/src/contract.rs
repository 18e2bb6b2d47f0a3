#![allow(unused)]

//! # contract: interfaces to external collaborators
//!
//! This module defines the trait seams between the monitoring pipeline and the
//! outside world: fetching current content for a source, and filing a
//! notification ticket when change is detected.
//!
//! ## Interface & Extensibility
//! - Implement [`Fetcher`] to supply current-state snapshots for a source
//!   (HTTP content host, fixtures, mocks).
//! - Implement [`Notifier`] to deliver change notifications (issue tracker,
//!   test double).
//! - All methods are async, returning results with boxed error types.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::download::SourceAction;
use crate::snapshot::Snapshot;

/// Error type for the Fetcher trait (simple boxed error).
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for the Notifier trait (simple boxed error).
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Channel-level metadata captured when fetching a feed source, persisted
/// beside the snapshot for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedMetadata {
    pub feed_title: String,
    pub feed_link: String,
    pub feed_description: String,
    pub feed_url: String,
    pub feed_index: usize,
    pub last_updated: String,
    pub total_entries: usize,
}

/// The result of fetching one source: its canonical current snapshot plus any
/// source-type-specific metadata.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    /// Human-readable logical name (repository slug or feed URL).
    pub logical_name: String,
    /// Deterministic state-store key for this source.
    pub source_key: String,
    /// Canonical current state, one TrackedItem per document/entry.
    pub snapshot: Snapshot,
    /// Present for feed sources only.
    pub feed: Option<FeedMetadata>,
}

/// Trait for producing the current snapshot of a monitored source.
/// Allows plugging in real, test, or mockable fetchers.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the source's current content, normalized into a canonical
    /// snapshot. Implementations own network timeouts; a failure here is
    /// isolated to this source by the caller.
    async fn fetch_source(&self, source: &SourceAction) -> Result<FetchedSource, FetchError>;
}

/// Minimal data needed to file a notification ticket.
pub struct NewTicket<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub labels: Vec<String>,
    /// Optional username the ticket should be assigned to.
    pub assignee: Option<&'a str>,
}

/// The created ticket as reported back by the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub number: i64,
    pub url: String,
}

/// Trait for filing change-notification tickets in an external tracker.
/// Implemented by the real API client in the CLI crate and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Create a ticket. The implementor is responsible for transport,
    /// authentication and assignment semantics.
    async fn create_ticket<'a>(&self, req: NewTicket<'a>) -> Result<Ticket, NotifyError>;
}
