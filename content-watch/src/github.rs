#![doc = "Notifier integration for the CLI: bridges the core trait abstraction to the issue-tracker REST API."]
//
//! # Notifier Integration (CLI <-> Core)
//!
//! This module wires up the core [`Notifier`] trait for real use against the
//! GitHub issues API, providing the `GithubClient` used by the `notify`
//! subcommand.
//!
//! - Construct [`GithubClient`] from environment variables (`GITHUB_TOKEN`,
//!   `GITHUB_REPOSITORY`, optional `GITHUB_API_URL`).
//! - All transport, serialization and error handling are encapsulated here;
//!   the trait itself is agnostic of authentication details.
//!
//! For the trait contract and its mock, see core's `contract` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use content_watch_core::contract::{NewTicket, Notifier, NotifyError, Ticket};

pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
    repository: String,
}

impl GithubClient {
    pub fn new_from_env() -> Result<Self, NotifyError> {
        dotenvy::dotenv().ok();
        match (env::var("GITHUB_TOKEN"), env::var("GITHUB_REPOSITORY")) {
            (Ok(token), Ok(repository)) => {
                let api_base = env::var("GITHUB_API_URL")
                    .unwrap_or_else(|_| crate::load_config::DEFAULT_API_BASE.to_string());
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .user_agent("content-watch")
                    .build()?;
                tracing::info!(
                    repository = %repository,
                    api_base = %api_base,
                    "Initialized GithubClient from environment"
                );
                Ok(GithubClient {
                    client,
                    api_base,
                    token,
                    repository,
                })
            }
            (Err(e), _) => {
                tracing::error!(error = ?e, "GITHUB_TOKEN missing in environment");
                Err(Box::new(e))
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "GITHUB_REPOSITORY missing in environment");
                Err(Box::new(e))
            }
        }
    }
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    assignees: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct IssueResponse {
    number: i64,
    html_url: String,
}

#[async_trait]
impl Notifier for GithubClient {
    async fn create_ticket<'a>(&self, req: NewTicket<'a>) -> Result<Ticket, NotifyError> {
        let url = format!("{}/repos/{}/issues", self.api_base, self.repository);
        tracing::info!(
            repository = %self.repository,
            title = req.title,
            labels = req.labels.len(),
            "Filing notification ticket"
        );

        let payload = CreateIssueRequest {
            title: req.title,
            body: req.body,
            labels: &req.labels,
            assignees: req.assignee.map(|a| vec![a.to_string()]),
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, url = %url, "Tracker API returned error: {body}");
            return Err(format!("tracker API error {status} creating ticket").into());
        }

        let issue: IssueResponse = response.json().await?;
        tracing::info!(
            number = issue.number,
            url = %issue.html_url,
            "Successfully created ticket"
        );
        Ok(Ticket {
            number: issue.number,
            url: issue.html_url,
        })
    }
}
