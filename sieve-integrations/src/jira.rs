//! Jira issue tracker (REST API v2).

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use sieve_core::config::TrackerConfig;
use sieve_core::error::{ConfigError, TrackerError, body_excerpt};
use sieve_core::ticket::{CreatedTicket, TicketRequest, TicketTracker};

use crate::http::{api_url, build_client, client_builder, parse_endpoint};

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

/// Creates issues through `POST /rest/api/2/issue`.
pub struct JiraTracker {
    client: reqwest::Client,
    base: Url,
    username: String,
    api_token: String,
}

impl JiraTracker {
    /// `api_token` is the already-resolved secret.
    pub fn new(config: &TrackerConfig, api_token: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(client_builder(config.timeout_secs))?,
            base: parse_endpoint("tracker.url", &config.url)?,
            username: config.username.clone(),
            api_token,
        })
    }
}

#[async_trait]
impl TicketTracker for JiraTracker {
    fn name(&self) -> &str {
        "jira"
    }

    fn browse_url(&self, key: &str) -> Option<String> {
        Some(api_url(&self.base, &["browse", key]).to_string())
    }

    async fn create_issue(&self, request: &TicketRequest) -> Result<CreatedTicket, TrackerError> {
        let url = api_url(&self.base, &["rest", "api", "2", "issue"]);
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .json(&request.to_payload())
            .send()
            .await
            .map_err(|e| TrackerError::Request {
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| TrackerError::Request {
            message: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(TrackerError::Rejected {
                status: status.as_u16(),
                body: body_excerpt(&body),
            });
        }

        created_ticket(status, &body, |key| self.browse_url(key))
    }
}

/// Key recorded when Jira answers 201 without naming the issue.
pub const UNKNOWN_ISSUE_KEY: &str = "Unknown";

/// A 201 is success on its own; any other 2xx must name the new issue.
fn created_ticket(
    status: reqwest::StatusCode,
    body: &str,
    browse_url: impl Fn(&str) -> Option<String>,
) -> Result<CreatedTicket, TrackerError> {
    match serde_json::from_str::<CreatedIssue>(body) {
        Ok(issue) => Ok(CreatedTicket {
            url: browse_url(&issue.key),
            key: issue.key,
        }),
        Err(_) if status == reqwest::StatusCode::CREATED => {
            tracing::warn!("Tracker returned 201 without an issue key");
            Ok(CreatedTicket {
                key: UNKNOWN_ISSUE_KEY.to_string(),
                url: None,
            })
        }
        Err(e) => Err(TrackerError::Parse {
            message: format!("HTTP {}: {e}", status.as_u16()),
        }),
    }
}

impl std::fmt::Debug for JiraTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraTracker")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
