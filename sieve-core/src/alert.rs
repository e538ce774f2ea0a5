//! Alert model: the read-only record retrieved from a SIEM.
//!
//! Backends return loosely-typed records whose field names differ per product.
//! [`Alert::from_record`] normalizes them; missing fields become empty or `None`
//! so downstream checks fail deterministically instead of erroring.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::Path;

/// Alert severity, parsed case-insensitively from an open-ended vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    /// Any value outside the known vocabulary, stored lowercased.
    Other(String),
}

impl Severity {
    /// Parse a severity string. Blank input yields the default (`Medium`).
    pub fn parse(raw: &str) -> Self {
        let folded = raw.trim().to_lowercase();
        match folded.as_str() {
            "" => Severity::Medium,
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Other(folded),
        }
    }

    /// Lowercase name, as used in labels and queries.
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Other(s) => s.as_str(),
        }
    }

    /// Tracker label derived from the severity, e.g. `severity-high`.
    pub fn label(&self) -> String {
        format!("severity-{}", self.as_str())
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Severity::parse(&raw))
    }
}

/// Alert timestamp as delivered by the backend: free text or a numeric epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertTimestamp {
    Epoch(i64),
    Text(String),
}

impl AlertTimestamp {
    /// Epochs above this are interpreted as milliseconds.
    const MILLIS_CUTOFF: i64 = 100_000_000_000;

    /// Convert to a UTC datetime when the value is an epoch or RFC 3339 text.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AlertTimestamp::Epoch(n) if n.abs() > Self::MILLIS_CUTOFF => {
                Utc.timestamp_millis_opt(*n).single()
            }
            AlertTimestamp::Epoch(n) => Utc.timestamp_opt(*n, 0).single(),
            AlertTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl std::fmt::Display for AlertTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertTimestamp::Epoch(n) => match self.to_datetime() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "{n}"),
            },
            AlertTimestamp::Text(s) => f.write_str(s),
        }
    }
}

/// A security alert retrieved from a SIEM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    /// Alert identifier (synthesized when the backend provides none).
    pub id: String,
    /// When the alert fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<AlertTimestamp>,
    /// Alert title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Severity (defaults to medium when absent).
    pub severity: Severity,
    /// Workflow status reported by the SIEM, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_rule: Option<String>,
}

const ID_KEYS: &[&str] = &["id", "alert_id"];
const SYNTHETIC_ID_KEYS: &[&str] = &["_messageid", "_cd"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "_time", "_messagetime"];
const TITLE_KEYS: &[&str] = &["title", "search_name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "message"];
const SEVERITY_KEYS: &[&str] = &["severity", "urgency"];
const STATUS_KEYS: &[&str] = &["status"];
const SOURCE_IP_KEYS: &[&str] = &["source_ip", "src_ip", "src"];
const DESTINATION_IP_KEYS: &[&str] = &["destination_ip", "dest_ip", "dst_ip", "dest"];
const USER_KEYS: &[&str] = &["affected_user", "user"];
const HOST_KEYS: &[&str] = &["affected_host", "host", "dest_host"];
const RULE_KEYS: &[&str] = &["detection_rule", "rule_name", "rule"];

impl Alert {
    /// Normalize a raw backend record into an `Alert`.
    ///
    /// `source_tag` prefixes synthesized identifiers (e.g. `sumo-logic_<messageid>`).
    pub fn from_record(source_tag: &str, record: &Map<String, Value>) -> Self {
        let id = first_string(record, ID_KEYS).unwrap_or_else(|| {
            match first_string(record, SYNTHETIC_ID_KEYS) {
                Some(native) => format!("{source_tag}_{native}"),
                None => format!("{source_tag}_{}", uuid::Uuid::new_v4()),
            }
        });

        Self {
            id,
            timestamp: first_timestamp(record, TIMESTAMP_KEYS),
            title: first_string(record, TITLE_KEYS).unwrap_or_default(),
            description: first_string(record, DESCRIPTION_KEYS).unwrap_or_default(),
            severity: first_string(record, SEVERITY_KEYS)
                .map(|s| Severity::parse(&s))
                .unwrap_or_default(),
            status: first_string(record, STATUS_KEYS),
            source_ip: first_string(record, SOURCE_IP_KEYS),
            destination_ip: first_string(record, DESTINATION_IP_KEYS),
            affected_user: first_string(record, USER_KEYS),
            affected_host: first_string(record, HOST_KEYS),
            detection_rule: first_string(record, RULE_KEYS),
        }
    }

    /// Whether the SIEM reports this alert as resolved.
    pub fn is_resolved(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("resolved"))
    }

    /// Title for display, never empty.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Unknown Alert"
        } else {
            &self.title
        }
    }
}

/// First non-blank value under any of `keys`, stringified.
fn first_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find_map(value_to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Splunk returns multivalue fields as arrays; take the first entry.
        Value::Array(items) => return items.iter().find_map(value_to_string),
        Value::Null | Value::Object(_) => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn first_timestamp(record: &Map<String, Value>, keys: &[&str]) -> Option<AlertTimestamp> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_i64().map(AlertTimestamp::Epoch),
            Value::String(s) if !s.trim().is_empty() => {
                // Sumo Logic delivers epoch millis as a numeric string.
                match s.trim().parse::<i64>() {
                    Ok(n) => Some(AlertTimestamp::Epoch(n)),
                    Err(_) => Some(AlertTimestamp::Text(s.trim().to_string())),
                }
            }
            _ => None,
        })
}

/// Normalize a JSON document of alert records.
///
/// Accepts a bare array or an object with an `alerts` array; returns `None` for
/// any other shape. Non-object entries are skipped.
pub fn alerts_from_json(source_tag: &str, document: &Value) -> Option<Vec<Alert>> {
    let records = match document {
        Value::Array(items) => items,
        Value::Object(map) => map.get("alerts")?.as_array()?,
        _ => return None,
    };
    Some(
        records
            .iter()
            .filter_map(Value::as_object)
            .map(|r| Alert::from_record(source_tag, r))
            .collect(),
    )
}

/// Read a batch of alerts from a JSON file.
pub fn read_alerts(path: &Path) -> crate::Result<Vec<Alert>> {
    let content = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    alerts_from_json("file", &document).ok_or_else(|| {
        crate::SieveError::Serialization(serde::de::Error::custom(
            "expected a JSON array of alerts or an object with an \"alerts\" array",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse(" High "), Severity::High);
        assert_eq!(Severity::parse(""), Severity::Medium);
        assert_eq!(
            Severity::parse("Informational"),
            Severity::Other("informational".into())
        );
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(Severity::Critical.label(), "severity-critical");
        assert_eq!(Severity::parse("SEV1").label(), "severity-sev1");
    }

    #[test]
    fn test_from_record_splunk_fields() {
        let alert = Alert::from_record(
            "splunk",
            &record(json!({
                "_time": "2026-03-01T10:00:00.000+00:00",
                "title": "Brute force",
                "description": "Many failed logins",
                "severity": "high",
                "source_ip": "10.0.0.5",
                "dest_ip": "10.0.0.9",
                "_cd": "12:345"
            })),
        );

        assert_eq!(alert.id, "splunk_12:345");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.destination_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(
            alert.timestamp,
            Some(AlertTimestamp::Text("2026-03-01T10:00:00.000+00:00".into()))
        );
        assert!(alert.affected_user.is_none());
    }

    #[test]
    fn test_from_record_sumo_fields() {
        let alert = Alert::from_record(
            "sumo-logic",
            &record(json!({
                "alert_id": "A-77",
                "_messagetime": "1767225600000",
                "title": "Suspicious login",
                "severity": "CRITICAL",
                "destination_ip": "192.168.1.4",
                "affected_user": "alice",
                "affected_host": "web-01",
                "detection_rule": "APT29 Persistence"
            })),
        );

        assert_eq!(alert.id, "A-77");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.timestamp, Some(AlertTimestamp::Epoch(1_767_225_600_000)));
        assert_eq!(alert.affected_host.as_deref(), Some("web-01"));
        assert_eq!(alert.description, "");
    }

    #[test]
    fn test_from_record_synthesizes_missing_id() {
        let alert = Alert::from_record("siem", &record(json!({"title": "x"})));
        assert!(alert.id.starts_with("siem_"));
        assert!(alert.id.len() > "siem_".len());
    }

    #[test]
    fn test_blank_fields_become_none() {
        let alert = Alert::from_record(
            "siem",
            &record(json!({"id": "1", "affected_user": "   ", "source_ip": null})),
        );
        assert!(alert.affected_user.is_none());
        assert!(alert.source_ip.is_none());
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn test_epoch_display() {
        let secs = AlertTimestamp::Epoch(0);
        assert_eq!(secs.to_string(), "1970-01-01T00:00:00+00:00");
        let millis = AlertTimestamp::Epoch(1_767_225_600_000);
        assert_eq!(millis.to_string(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_is_resolved() {
        let mut alert = Alert {
            status: Some("RESOLVED".into()),
            ..Default::default()
        };
        assert!(alert.is_resolved());
        alert.status = Some("open".into());
        assert!(!alert.is_resolved());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let alert: Alert =
            serde_json::from_value(json!({"title": "Routine scan", "severity": "LOW"})).unwrap();
        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(alert.description, "");
        assert!(alert.timestamp.is_none());
    }

    #[test]
    fn test_alerts_from_json_shapes() {
        let bare = json!([{"id": "1", "severity": "high"}, "junk"]);
        let alerts = alerts_from_json("file", &bare).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);

        let wrapped = json!({"alerts": [{"id": "1"}, {"id": "2"}]});
        assert_eq!(alerts_from_json("file", &wrapped).unwrap().len(), 2);

        assert!(alerts_from_json("file", &json!({"items": []})).is_none());
        assert!(alerts_from_json("file", &json!("text")).is_none());
    }

    #[test]
    fn test_read_alerts_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(&path, r#"[{"alert_id": "A-9", "title": "Beacon"}]"#).unwrap();
        let alerts = read_alerts(&path).unwrap();
        assert_eq!(alerts[0].id, "A-9");

        std::fs::write(&path, r#"{"count": 3}"#).unwrap();
        assert!(matches!(
            read_alerts(&path),
            Err(crate::SieveError::Serialization(_))
        ));
        assert!(matches!(
            read_alerts(&dir.path().join("missing.json")),
            Err(crate::SieveError::Io(_))
        ));
    }
}
