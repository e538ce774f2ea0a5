//! Sumo Logic alert source, backed by the Search Job API.
//!
//! A search is asynchronous on the Sumo side: create a job, poll its state
//! until results are gathered, then page the records. `fetch` hides all of
//! that behind a single call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use url::Url;

use sieve_core::alert::Alert;
use sieve_core::config::SumoLogicConfig;
use sieve_core::error::{ConfigError, SourceError};
use sieve_core::source::{AlertQuery, AlertSource};

use crate::http::{api_url, build_client, client_builder, parse_endpoint, read_json, request_error};

const BACKEND: &str = "sumo-logic";

/// Raw JSON keys extracted by the search, with the field name they become.
const EXTRACTED_FIELDS: &[(&str, &str)] = &[
    ("alert_id", "alert_id"),
    ("title", "title"),
    ("description", "description"),
    ("severity", "severity"),
    ("status", "status"),
    ("source_ip", "source_ip"),
    ("destination_ip", "destination_ip"),
    ("user", "affected_user"),
    ("host", "affected_host"),
    ("detection_rule", "detection_rule"),
];

const STATE_DONE: &str = "DONE GATHERING RESULTS";
const STATE_CANCELLED: &str = "CANCELLED";
const STATE_FORCE_PAUSED: &str = "FORCE PAUSED";

#[derive(Debug, Deserialize)]
struct CreatedJob {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    record_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    map: Map<String, Value>,
}

/// Sumo Logic Search Job API client.
pub struct SumoLogicSource {
    client: reqwest::Client,
    endpoint: Url,
    access_id: String,
    access_key: String,
    source_category: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl SumoLogicSource {
    /// `access_id` and `access_key` are the already-resolved secrets.
    pub fn new(
        config: &SumoLogicConfig,
        access_id: String,
        access_key: String,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            // The job API ties follow-up requests to the creating session by cookie.
            client: build_client(client_builder(config.timeout_secs).cookie_store(true))?,
            endpoint: parse_endpoint("source.endpoint", &config.endpoint)?,
            access_id,
            access_key,
            source_category: config.source_category.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Search expression for the fixed filter.
    ///
    /// Fields are extracted from the raw JSON message before any `where`
    /// refers to them. Optional fields use `nodrop` so a missing key keeps
    /// the message.
    pub fn search_query(&self, query: &AlertQuery) -> String {
        let mut q = format!("_sourceCategory={}", self.source_category);
        for (field, alias) in EXTRACTED_FIELDS {
            q.push_str(&format!("\n| json field=_raw \"{field}\" as {alias}"));
            if *field != "severity" {
                q.push_str(" nodrop");
            }
        }
        q.push_str(&format!(
            "\n| where severity in (\"HIGH\", \"CRITICAL\", \"high\", \"critical\")\
             \n| where status != \"RESOLVED\" and status != \"resolved\"\
             \n| sort by _messageTime desc\
             \n| limit {}",
            query.limit
        ));
        q
    }

    fn jobs_url(&self, tail: &[&str]) -> Url {
        let mut segments = vec!["api", "v1", "search", "jobs"];
        segments.extend_from_slice(tail);
        api_url(&self.endpoint, &segments)
    }

    async fn create_job(&self, query: &AlertQuery) -> Result<String, SourceError> {
        let body = json!({
            "query": self.search_query(query),
            "from": query.start().timestamp_millis(),
            "to": query.end.timestamp_millis(),
            "timeZone": "UTC",
        });
        let resp = self
            .client
            .post(self.jobs_url(&[]))
            .basic_auth(&self.access_id, Some(&self.access_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(BACKEND, e))?;

        let job: CreatedJob = read_json(BACKEND, resp).await?;
        Ok(job.id)
    }

    async fn job_status(&self, id: &str) -> Result<JobStatus, SourceError> {
        let resp = self
            .client
            .get(self.jobs_url(&[id]))
            .basic_auth(&self.access_id, Some(&self.access_key))
            .send()
            .await
            .map_err(|e| request_error(BACKEND, e))?;
        read_json(BACKEND, resp).await
    }

    async fn wait_for_completion(&self, id: &str) -> Result<(), SourceError> {
        let started = Instant::now();
        loop {
            let status = self.job_status(id).await?;
            match status.state.as_str() {
                STATE_DONE => {
                    tracing::debug!(
                        job_id = %id,
                        records = status.record_count.unwrap_or(0),
                        "Sumo Logic search job complete"
                    );
                    return Ok(());
                }
                STATE_CANCELLED | STATE_FORCE_PAUSED => {
                    return Err(SourceError::SearchFailed {
                        state: status.state,
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.max_wait {
                return Err(SourceError::Timeout {
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tracing::debug!(
                job_id = %id,
                state = %status.state,
                "Waiting for Sumo Logic search job"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn records(&self, id: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        let limit = limit.to_string();
        let resp = self
            .client
            .get(self.jobs_url(&[id, "records"]))
            .basic_auth(&self.access_id, Some(&self.access_key))
            .query(&[("offset", "0"), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| request_error(BACKEND, e))?;

        let page: RecordPage = read_json(BACKEND, resp).await?;
        Ok(page.records)
    }

    /// Best-effort cleanup; Sumo expires idle jobs anyway.
    async fn delete_job(&self, id: &str) {
        let result = self
            .client
            .delete(self.jobs_url(&[id]))
            .basic_auth(&self.access_id, Some(&self.access_key))
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!(job_id = %id, error = %e, "Failed to delete Sumo Logic search job");
        }
    }
}

#[async_trait]
impl AlertSource for SumoLogicSource {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<Alert>, SourceError> {
        let id = self.create_job(query).await?;
        tracing::info!(job_id = %id, "Waiting for Sumo Logic to process the search");

        let result = match self.wait_for_completion(&id).await {
            Ok(()) => self.records(&id, query.limit).await,
            Err(e) => Err(e),
        };
        self.delete_job(&id).await;

        Ok(result?
            .iter()
            .map(|r| Alert::from_record(BACKEND, &r.map))
            .collect())
    }
}

impl std::fmt::Debug for SumoLogicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumoLogicSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("source_category", &self.source_category)
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}
