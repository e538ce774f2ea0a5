//! Alert source abstraction.
//!
//! Backends implement [`AlertSource`]; the pipeline calls [`retrieve`], which
//! never fails outright. A backend error yields an empty batch, but the error
//! is kept on the returned [`Retrieval`] so callers can still tell
//! "no alerts" apart from "query failed".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::alert::Alert;
use crate::error::SourceError;

/// Parameters for one retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertQuery {
    /// Lookback window ending at `end`.
    pub window: Duration,
    pub end: DateTime<Utc>,
    /// Maximum number of alerts to return.
    pub limit: usize,
}

impl AlertQuery {
    pub fn ending_now(window: Duration, limit: usize) -> Self {
        Self {
            window,
            end: Utc::now(),
            limit,
        }
    }

    /// Start of the window. Saturates at the epoch floor for absurd windows.
    pub fn start(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|w| self.end.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A SIEM backend that can return alerts for a time window.
///
/// Implementations apply the fixed filter (severity high or critical, status
/// not resolved) either in the backend query or locally.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Label-safe backend tag, e.g. `splunk`.
    fn name(&self) -> &str;

    /// Run one query. A single blocking round trip from the caller's view.
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<Alert>, SourceError>;
}

/// Outcome of a best-effort retrieval.
#[derive(Debug)]
pub struct Retrieval {
    alerts: Vec<Alert>,
    error: Option<SourceError>,
}

impl Retrieval {
    pub fn succeeded(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            error: None,
        }
    }

    pub fn failed(error: SourceError) -> Self {
        Self {
            alerts: Vec::new(),
            error: Some(error),
        }
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn into_alerts(self) -> Vec<Alert> {
        self.alerts
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetch alerts, logging and absorbing any backend error.
pub async fn retrieve(source: &dyn AlertSource, query: &AlertQuery) -> Retrieval {
    tracing::info!(
        source = source.name(),
        window = %humantime::format_duration(query.window),
        limit = query.limit,
        "Searching for alerts"
    );

    match source.fetch(query).await {
        Ok(mut alerts) => {
            if alerts.len() > query.limit {
                tracing::debug!(
                    returned = alerts.len(),
                    limit = query.limit,
                    "Backend returned more alerts than requested; truncating"
                );
                alerts.truncate(query.limit);
            }
            tracing::info!(source = source.name(), count = alerts.len(), "Alerts retrieved");
            Retrieval::succeeded(alerts)
        }
        Err(e) => {
            tracing::error!(source = source.name(), error = %e, "Alert retrieval failed");
            Retrieval::failed(e)
        }
    }
}

/// The fixed retrieval filter, for backends that cannot express it in a query.
pub fn matches_fixed_filter(alert: &Alert) -> bool {
    use crate::alert::Severity;
    matches!(alert.severity, Severity::High | Severity::Critical) && !alert.is_resolved()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;

    struct StaticSource {
        result: fn() -> Result<Vec<Alert>, SourceError>,
    }

    #[async_trait]
    impl AlertSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, _query: &AlertQuery) -> Result<Vec<Alert>, SourceError> {
            (self.result)()
        }
    }

    fn many() -> Result<Vec<Alert>, SourceError> {
        Ok((0..5)
            .map(|i| Alert {
                id: format!("a-{i}"),
                ..Default::default()
            })
            .collect())
    }

    fn broken() -> Result<Vec<Alert>, SourceError> {
        Err(SourceError::Request {
            backend: "static".into(),
            message: "connection refused".into(),
        })
    }

    #[test]
    fn test_query_start() {
        let query = AlertQuery::ending_now(Duration::from_secs(3600), 10);
        assert_eq!((query.end - query.start()).num_seconds(), 3600);
    }

    #[tokio::test]
    async fn test_retrieve_truncates_to_limit() {
        let source = StaticSource { result: many };
        let query = AlertQuery::ending_now(Duration::from_secs(60), 3);
        let retrieval = retrieve(&source, &query).await;
        assert!(!retrieval.is_failed());
        assert_eq!(retrieval.alerts().len(), 3);
        assert_eq!(retrieval.alerts()[0].id, "a-0");
    }

    #[tokio::test]
    async fn test_retrieve_failure_yields_empty_batch() {
        let source = StaticSource { result: broken };
        let query = AlertQuery::ending_now(Duration::from_secs(60), 100);
        let retrieval = retrieve(&source, &query).await;
        assert!(retrieval.is_failed());
        assert!(retrieval.alerts().is_empty());
        assert!(
            retrieval
                .error()
                .is_some_and(|e| e.to_string().contains("connection refused"))
        );
    }

    #[test]
    fn test_fixed_filter() {
        let open_high = Alert {
            severity: Severity::High,
            ..Default::default()
        };
        let resolved_critical = Alert {
            severity: Severity::Critical,
            status: Some("Resolved".into()),
            ..Default::default()
        };
        let medium = Alert::default();
        assert!(matches_fixed_filter(&open_high));
        assert!(!matches_fixed_filter(&resolved_critical));
        assert!(!matches_fixed_filter(&medium));
    }
}
