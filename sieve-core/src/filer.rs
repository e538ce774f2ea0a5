//! Ticket filer: turns actionable alerts into tracker tickets.

use serde::Serialize;

use crate::alert::Alert;
use crate::classifier::Assessment;
use crate::ticket::{Priority, TicketRequest, TicketTemplate, TicketTracker};

/// Result of filing one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FilingOutcome {
    /// The tracker accepted the ticket.
    Created { key: String, url: Option<String> },
    /// Test mode: nothing was sent.
    DryRun { summary: String, priority: String },
    /// The tracker call failed or was rejected.
    Failed { reason: String },
}

impl FilingOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, FilingOutcome::Created { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FilingOutcome::Failed { .. })
    }

    pub fn ticket_key(&self) -> Option<&str> {
        match self {
            FilingOutcome::Created { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilingOutcome::Created { key, url: Some(url) } => write!(f, "created {key} ({url})"),
            FilingOutcome::Created { key, url: None } => write!(f, "created {key}"),
            FilingOutcome::DryRun { summary, priority } => {
                write!(f, "would create [{priority}] {summary}")
            }
            FilingOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Files tickets through a [`TicketTracker`], or only logs them in test mode.
///
/// Filing is not idempotent: filing the same alert twice sends two create calls.
pub struct TicketFiler {
    tracker: Option<Box<dyn TicketTracker>>,
    template: TicketTemplate,
}

impl TicketFiler {
    pub fn new(tracker: Box<dyn TicketTracker>, template: TicketTemplate) -> Self {
        Self {
            tracker: Some(tracker),
            template,
        }
    }

    /// A filer that never contacts a tracker.
    pub fn dry_run(template: TicketTemplate) -> Self {
        Self {
            tracker: None,
            template,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.tracker.is_none()
    }

    pub fn template(&self) -> &TicketTemplate {
        &self.template
    }

    /// File a ticket for `alert`.
    pub async fn file(&self, alert: &Alert) -> FilingOutcome {
        self.submit(self.template.build(alert, None)).await
    }

    /// File a ticket whose description includes the classifier's assessment.
    pub async fn file_assessed(&self, alert: &Alert, assessment: &Assessment) -> FilingOutcome {
        self.submit(self.template.build(alert, Some(assessment)))
            .await
    }

    async fn submit(&self, request: TicketRequest) -> FilingOutcome {
        let Some(tracker) = &self.tracker else {
            tracing::info!(
                summary = %request.summary,
                priority = %request.priority,
                labels = ?request.labels,
                "TEST MODE: would create ticket"
            );
            return FilingOutcome::DryRun {
                summary: request.summary,
                priority: request.priority.as_str().to_string(),
            };
        };

        match tracker.create_issue(&request).await {
            Ok(ticket) => {
                tracing::info!(
                    tracker = tracker.name(),
                    key = %ticket.key,
                    url = ticket.url.as_deref().unwrap_or(""),
                    "Created ticket"
                );
                FilingOutcome::Created {
                    key: ticket.key,
                    url: ticket.url,
                }
            }
            Err(e) => {
                tracing::error!(
                    tracker = tracker.name(),
                    summary = %request.summary,
                    error = %e,
                    "Failed to create ticket"
                );
                FilingOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for TicketFiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketFiler")
            .field("tracker", &self.tracker.as_ref().map(|t| t.name()))
            .field("project_key", &self.template.project_key)
            .finish()
    }
}

/// Priority a ticket for `alert` would receive.
pub fn priority_for(alert: &Alert) -> Priority {
    Priority::from_severity(&alert.severity)
}
