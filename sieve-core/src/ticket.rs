//! Ticket model: what gets filed in the issue tracker for an actionable alert.

use std::fmt::{self, Write};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::alert::{Alert, Severity};
use crate::classifier::Assessment;
use crate::config::{SourceConfig, TrackerConfig};
use crate::error::TrackerError;

/// Tracker priority names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Highest,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Fixed severity → priority mapping; unrecognized severities map to `Medium`.
    pub fn from_severity(severity: &Severity) -> Self {
        match severity {
            Severity::Critical => Priority::Highest,
            Severity::High => Priority::High,
            Severity::Medium => Priority::Medium,
            Severity::Low => Priority::Low,
            Severity::Other(_) => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Highest => "Highest",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: Priority,
    pub labels: Vec<String>,
}

impl TicketRequest {
    /// Tracker wire body (`{"fields": {...}}`).
    pub fn to_payload(&self) -> serde_json::Value {
        json!({
            "fields": {
                "project": { "key": self.project_key },
                "summary": self.summary,
                "description": self.description,
                "issuetype": { "name": self.issue_type },
                "priority": { "name": self.priority.as_str() },
                "labels": self.labels,
            }
        })
    }
}

/// A ticket the tracker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTicket {
    pub key: String,
    /// Browse URL, when the tracker can build one.
    pub url: Option<String>,
}

/// An issue tracker that can create tickets.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Human-facing link to a ticket, if the tracker has one.
    fn browse_url(&self, _key: &str) -> Option<String> {
        None
    }

    /// One network call; no retry.
    async fn create_issue(&self, request: &TicketRequest) -> Result<CreatedTicket, TrackerError>;
}

/// Static parts of every ticket, derived from configuration.
#[derive(Debug, Clone)]
pub struct TicketTemplate {
    pub project_key: String,
    pub issue_type: String,
    pub summary_prefix: String,
    /// Backend name as shown in the description ("Splunk").
    pub source_name: String,
    /// Backend tag used as a label ("splunk").
    pub source_label: String,
    pub extra_labels: Vec<String>,
    pub search_url: Option<String>,
    pub playbook_url: Option<String>,
}

impl Default for TicketTemplate {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default(), None)
    }
}

const INVESTIGATION_STEPS: &[&str] = &[
    "Review the alert details above",
    "Check the SIEM for additional context around this timeframe",
    "Verify if this activity is authorized/expected",
    "If malicious: contain, investigate, and remediate",
    "Update this ticket with findings and actions taken",
];

impl TicketTemplate {
    pub fn from_config(tracker: &TrackerConfig, source: Option<&SourceConfig>) -> Self {
        Self {
            project_key: tracker.project_key.clone(),
            issue_type: tracker.issue_type.clone(),
            summary_prefix: tracker.summary_prefix.clone(),
            source_name: source.map(|s| s.display_name()).unwrap_or("SIEM").to_string(),
            source_label: source.map(|s| s.label()).unwrap_or("siem").to_string(),
            extra_labels: tracker.labels.clone(),
            search_url: tracker.search_url.clone(),
            playbook_url: tracker.playbook_url.clone(),
        }
    }

    /// Build the request for one alert.
    pub fn build(&self, alert: &Alert, assessment: Option<&Assessment>) -> TicketRequest {
        let title = if alert.title.trim().is_empty() {
            "Untitled Alert"
        } else {
            alert.title.trim()
        };

        TicketRequest {
            project_key: self.project_key.clone(),
            summary: format!("{}{}", self.summary_prefix, title),
            description: self.render_description(alert, assessment),
            issue_type: self.issue_type.clone(),
            priority: Priority::from_severity(&alert.severity),
            labels: self.labels_for(alert),
        }
    }

    fn labels_for(&self, alert: &Alert) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        let candidates = ["security-alert".to_string(), self.source_label.clone()]
            .into_iter()
            .chain(std::iter::once(alert.severity.label()))
            .chain(self.extra_labels.iter().cloned());
        for label in candidates {
            // Jira labels cannot contain spaces.
            let label = label.trim().replace(' ', "-");
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    fn render_description(&self, alert: &Alert, assessment: Option<&Assessment>) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_description(&mut out, alert, assessment);
        out
    }

    fn write_description(
        &self,
        out: &mut String,
        alert: &Alert,
        assessment: Option<&Assessment>,
    ) -> fmt::Result {
        let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
        let description = if alert.description.trim().is_empty() {
            "No description available"
        } else {
            alert.description.trim()
        };
        let detected = alert
            .timestamp
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        writeln!(out, "*Security Alert Detected via {}*\n", self.source_name)?;

        writeln!(out, "*Alert Details:*")?;
        writeln!(out, "• *Alert ID:* {}", alert.id)?;
        writeln!(out, "• *Severity:* {}", alert.severity.as_str().to_uppercase())?;
        writeln!(out, "• *Detection Time:* {detected}")?;
        writeln!(
            out,
            "• *Detection Rule:* {}\n",
            alert.detection_rule.as_deref().unwrap_or("Not specified")
        )?;

        writeln!(out, "*Alert Description:*\n{description}\n")?;

        writeln!(out, "*Technical Details:*")?;
        writeln!(out, "• *Source IP:* {}", or_na(&alert.source_ip))?;
        writeln!(out, "• *Destination IP:* {}", or_na(&alert.destination_ip))?;
        writeln!(out, "• *Affected User:* {}", or_na(&alert.affected_user))?;
        writeln!(out, "• *Affected Host:* {}\n", or_na(&alert.affected_host))?;

        if let Some(a) = assessment {
            writeln!(out, "*Triage Assessment:*")?;
            writeln!(
                out,
                "• *Score:* {}/{} (threshold {})",
                a.score, a.max_score, a.threshold
            )?;
            let fired = if a.fired.is_empty() {
                "none".to_string()
            } else {
                a.fired.join(", ")
            };
            writeln!(out, "• *Indicators:* {fired}\n")?;
        }

        writeln!(out, "*Investigation Steps:*")?;
        for (i, step) in INVESTIGATION_STEPS.iter().enumerate() {
            writeln!(out, "{}. {step}", i + 1)?;
        }

        let links: Vec<(&str, &str)> = [
            ("SIEM Search", self.search_url.as_deref()),
            ("Security Playbooks", self.playbook_url.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, url)| url.map(|u| (name, u)))
        .collect();
        if !links.is_empty() {
            writeln!(out, "\n*Quick Links:*")?;
            for (name, url) in links {
                writeln!(out, "• [{name}|{url}]")?;
            }
        }

        writeln!(
            out,
            "\n----\n_This ticket was automatically created by the {} alert triage pipeline._",
            self.source_name
        )
    }
}
