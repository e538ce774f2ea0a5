//! Triage pipeline: retrieve → classify → file.
//!
//! Processing is strictly sequential. One awaited retrieval, then one alert at
//! a time. Per-alert filing failures are recorded in the report and never stop
//! the run.

use serde::Serialize;

use crate::classifier::{ActionabilityPolicy, Assessment};
use crate::filer::{FilingOutcome, TicketFiler};
use crate::source::{AlertQuery, AlertSource, retrieve};

/// Whether the retrieval step produced a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalStatus {
    Succeeded { count: usize },
    Failed { reason: String },
}

/// What happened to one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertDisposition {
    pub alert_id: String,
    pub title: String,
    pub assessment: Assessment,
    /// `None` when the alert was not actionable.
    pub outcome: Option<FilingOutcome>,
}

/// Counts derived from a [`TriageReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriageSummary {
    pub total: usize,
    pub actionable: usize,
    pub created: usize,
    pub failed: usize,
    pub would_create: usize,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageReport {
    pub retrieval: RetrievalStatus,
    pub dispositions: Vec<AlertDisposition>,
    pub test_mode: bool,
}

impl TriageReport {
    pub fn summary(&self) -> TriageSummary {
        let mut summary = TriageSummary {
            total: self.dispositions.len(),
            ..Default::default()
        };
        for d in &self.dispositions {
            if d.assessment.actionable {
                summary.actionable += 1;
            }
            match &d.outcome {
                Some(FilingOutcome::Created { .. }) => summary.created += 1,
                Some(FilingOutcome::Failed { .. }) => summary.failed += 1,
                Some(FilingOutcome::DryRun { .. }) => summary.would_create += 1,
                None => {}
            }
        }
        summary
    }

    pub fn retrieval_failed(&self) -> bool {
        matches!(self.retrieval, RetrievalStatus::Failed { .. })
    }

    /// True when retrieval failed or any ticket could not be filed.
    pub fn has_failures(&self) -> bool {
        self.retrieval_failed() || self.summary().failed > 0
    }

    /// Created ticket keys, in processing order.
    pub fn created_keys(&self) -> Vec<&str> {
        self.dispositions
            .iter()
            .filter_map(|d| d.outcome.as_ref().and_then(FilingOutcome::ticket_key))
            .collect()
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        if let RetrievalStatus::Failed { reason } = &self.retrieval {
            tracing::warn!(reason = %reason, "Alert retrieval failed; nothing was triaged");
        }
        tracing::info!(
            total = summary.total,
            actionable = summary.actionable,
            created = summary.created,
            would_create = summary.would_create,
            failed = summary.failed,
            "Triage complete"
        );
        if self.test_mode {
            tracing::info!(
                would_create = summary.would_create,
                "TEST MODE: no tickets were created"
            );
        }
        if summary.failed > 0 {
            tracing::warn!(failed = summary.failed, "Some tickets could not be created");
        }
    }
}

/// Wires a source, a policy and a filer together.
pub struct TriagePipeline {
    source: Box<dyn AlertSource>,
    policy: Box<dyn ActionabilityPolicy>,
    filer: TicketFiler,
}

impl TriagePipeline {
    pub fn new(
        source: Box<dyn AlertSource>,
        policy: Box<dyn ActionabilityPolicy>,
        filer: TicketFiler,
    ) -> Self {
        Self {
            source,
            policy,
            filer,
        }
    }

    pub async fn run(&self, query: &AlertQuery) -> TriageReport {
        let test_mode = self.filer.is_dry_run();
        tracing::info!(
            source = self.source.name(),
            policy = self.policy.name(),
            test_mode,
            "Starting alert triage"
        );

        let retrieval = retrieve(self.source.as_ref(), query).await;
        let status = match retrieval.error() {
            Some(e) => RetrievalStatus::Failed {
                reason: e.to_string(),
            },
            None => RetrievalStatus::Succeeded {
                count: retrieval.alerts().len(),
            },
        };

        let alerts = retrieval.into_alerts();
        let total = alerts.len();
        let mut dispositions = Vec::with_capacity(total);

        for (i, alert) in alerts.iter().enumerate() {
            tracing::info!("[{}/{}] Evaluating: {}", i + 1, total, alert.display_title());

            let assessment = self.policy.assess(alert);
            tracing::debug!(alert_id = %alert.id, assessment = %assessment, "Assessed alert");

            let outcome = if assessment.actionable {
                tracing::info!(alert_id = %alert.id, "Actionable: {}", assessment);
                Some(self.filer.file_assessed(alert, &assessment).await)
            } else {
                tracing::debug!(alert_id = %alert.id, "Not actionable, skipping");
                None
            };

            dispositions.push(AlertDisposition {
                alert_id: alert.id.clone(),
                title: alert.display_title().to_string(),
                assessment,
                outcome,
            });
        }

        TriageReport {
            retrieval: status,
            dispositions,
            test_mode,
        }
    }
}
