//! Splunk alert source.
//!
//! Runs a blocking search job against the management API
//! (`POST /services/search/jobs` with `exec_mode=blocking`), then reads the
//! job's results in JSON.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use sieve_core::alert::Alert;
use sieve_core::config::SplunkConfig;
use sieve_core::error::{ConfigError, SourceError};
use sieve_core::source::{AlertQuery, AlertSource};

use crate::http::{api_url, build_client, client_builder, parse_endpoint, read_json, request_error};

const BACKEND: &str = "splunk";

#[derive(Debug, Deserialize)]
struct SearchJob {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<Map<String, Value>>,
}

/// Splunk REST search client.
pub struct SplunkSource {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: String,
    index: String,
}

impl SplunkSource {
    /// `password` is the already-resolved secret.
    pub fn new(config: &SplunkConfig, password: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(
                client_builder(config.timeout_secs)
                    .danger_accept_invalid_certs(config.accept_invalid_certs),
            )?,
            endpoint: parse_endpoint("source.endpoint", &config.endpoint)?,
            username: config.username.clone(),
            password,
            index: config.index.clone(),
        })
    }

    /// SPL for the fixed filter over the query window.
    pub fn search_query(&self, query: &AlertQuery) -> String {
        format!(
            "search index={} earliest=-{}s latest=now \
             | where severity=\"high\" OR severity=\"critical\" \
             | where status!=\"resolved\" \
             | sort -_time \
             | head {}",
            self.index,
            query.window.as_secs(),
            query.limit
        )
    }

    async fn create_job(&self, search: &str) -> Result<String, SourceError> {
        let url = api_url(&self.endpoint, &["services", "search", "jobs"]);
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[
                ("search", search),
                ("output_mode", "json"),
                ("exec_mode", "blocking"),
            ])
            .send()
            .await
            .map_err(|e| request_error(BACKEND, e))?;

        let job: SearchJob = read_json(BACKEND, resp).await?;
        Ok(job.sid)
    }

    async fn job_results(
        &self,
        sid: &str,
        limit: usize,
    ) -> Result<Vec<Map<String, Value>>, SourceError> {
        let url = api_url(&self.endpoint, &["services", "search", "jobs", sid, "results"]);
        let count = limit.to_string();
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("output_mode", "json"), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| request_error(BACKEND, e))?;

        let results: SearchResults = read_json(BACKEND, resp).await?;
        Ok(results.results)
    }
}

#[async_trait]
impl AlertSource for SplunkSource {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<Alert>, SourceError> {
        let search = self.search_query(query);
        tracing::debug!(search = %search, "Submitting Splunk search job");

        let sid = self.create_job(&search).await?;
        tracing::debug!(sid = %sid, "Splunk search job finished");

        let records = self.job_results(&sid, query.limit).await?;
        Ok(records
            .iter()
            .map(|r| Alert::from_record(BACKEND, r))
            .collect())
    }
}

impl std::fmt::Debug for SplunkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplunkSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("username", &self.username)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
