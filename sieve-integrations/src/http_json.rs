//! Generic JSON alert source.
//!
//! `GET {endpoint}` must return either a bare array of alert records or an
//! object with an `alerts` array. The fixed filter is applied locally.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use sieve_core::alert::{Alert, alerts_from_json};
use sieve_core::config::HttpSourceConfig;
use sieve_core::error::{ConfigError, SourceError};
use sieve_core::source::{AlertQuery, AlertSource, matches_fixed_filter};

use crate::http::{build_client, client_builder, parse_endpoint, read_json, request_error};

const BACKEND: &str = "siem";

/// Plain HTTP JSON alert feed.
pub struct HttpJsonSource {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpJsonSource {
    /// `token` is the resolved bearer token, if any.
    pub fn new(config: &HttpSourceConfig, token: Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(client_builder(config.timeout_secs))?,
            endpoint: parse_endpoint("source.endpoint", &config.endpoint)?,
            token: token.filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl AlertSource for HttpJsonSource {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<Alert>, SourceError> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await.map_err(|e| request_error(BACKEND, e))?;
        let body: Value = read_json(BACKEND, resp).await?;

        let received = alerts_from_json(BACKEND, &body).ok_or_else(|| SourceError::Parse {
            message: format!(
                "{BACKEND}: expected an array of alerts or an object with an \"alerts\" array"
            ),
        })?;
        let total = received.len();
        let start = query.start();
        let alerts: Vec<Alert> = received
            .into_iter()
            .filter(matches_fixed_filter)
            // Records without a parseable timestamp are kept.
            .filter(|a| {
                a.timestamp
                    .as_ref()
                    .and_then(|t| t.to_datetime())
                    .is_none_or(|t| t >= start && t <= query.end)
            })
            .collect();

        tracing::debug!(
            received = total,
            kept = alerts.len(),
            "Applied local alert filter"
        );
        Ok(alerts)
    }
}

impl std::fmt::Debug for HttpJsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}
