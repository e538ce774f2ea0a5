//! Configuration system for Sieve.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Without an explicit `--config` path, configuration is read from
//! `~/.config/sieve/config.toml` and/or `sieve.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

use crate::classifier::STANDARD_INDICATOR_COUNT;
use crate::error::ConfigError;
use crate::secret_ref::SecretRef;

/// Top-level configuration for a triage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// How far back from now to search for alerts (e.g. `"24h"`).
    pub time_window: TimeWindow,
    /// Upper bound on alerts retrieved per run.
    pub max_alerts: usize,
    /// Report what would be filed without creating tickets.
    pub test_mode: bool,
    /// Search backend to pull alerts from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
    pub classifier: ClassifierConfig,
    pub tracker: TrackerConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            time_window: TimeWindow::new(Duration::from_secs(24 * 3600)),
            max_alerts: 100,
            test_mode: false,
            source: None,
            classifier: ClassifierConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// A lookback duration, written in config files as a humantime string (`"24h"`, `"90m"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow(Duration);

impl TimeWindow {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// `None` when the hour count does not fit in a `Duration` of seconds.
    pub fn from_hours(hours: u64) -> Option<Self> {
        hours.checked_mul(3600).map(|secs| Self(Duration::from_secs(secs)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = humantime::DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        humantime::parse_duration(s.trim()).map(Self)
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", humantime::format_duration(self.0))
    }
}

impl Serialize for TimeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
    }
}

/// Which search backend to query, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Splunk(SplunkConfig),
    SumoLogic(SumoLogicConfig),
    Http(HttpSourceConfig),
}

impl SourceConfig {
    /// Base URL of the search backend.
    pub fn endpoint(&self) -> &str {
        match self {
            SourceConfig::Splunk(c) => &c.endpoint,
            SourceConfig::SumoLogic(c) => &c.endpoint,
            SourceConfig::Http(c) => &c.endpoint,
        }
    }

    /// Label-safe tag identifying the backend on tickets.
    pub fn label(&self) -> &'static str {
        match self {
            SourceConfig::Splunk(_) => "splunk",
            SourceConfig::SumoLogic(_) => "sumo-logic",
            SourceConfig::Http(_) => "siem",
        }
    }

    /// Human-readable backend name.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceConfig::Splunk(_) => "Splunk",
            SourceConfig::SumoLogic(_) => "Sumo Logic",
            SourceConfig::Http(_) => "SIEM",
        }
    }

    fn redacted(&self) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            SourceConfig::Splunk(c) => c.password = redact(&c.password),
            SourceConfig::SumoLogic(c) => {
                c.access_id = redact(&c.access_id);
                c.access_key = redact(&c.access_key);
            }
            SourceConfig::Http(c) => c.token = redact(&c.token),
        }
        copy
    }
}

/// Splunk REST API (management port) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplunkConfig {
    /// e.g. `https://splunk.example.com:8089`
    pub endpoint: String,
    pub username: String,
    pub password: SecretRef,
    /// Index holding security alerts.
    pub index: String,
    /// Accept self-signed certificates on the management port.
    pub accept_invalid_certs: bool,
    /// Request timeout; blocking searches can take a while.
    pub timeout_secs: u64,
}

impl Default for SplunkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: SecretRef::default(),
            index: "security".into(),
            accept_invalid_certs: false,
            timeout_secs: 120,
        }
    }
}

/// Sumo Logic Search Job API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SumoLogicConfig {
    /// Regional API endpoint, e.g. `https://api.us2.sumologic.com`
    pub endpoint: String,
    pub access_id: SecretRef,
    pub access_key: SecretRef,
    pub source_category: String,
    /// Delay between search job status polls.
    pub poll_interval_secs: u64,
    /// Give up waiting for the search job after this long.
    pub max_wait_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SumoLogicConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_id: SecretRef::default(),
            access_key: SecretRef::default(),
            source_category: "security/alerts".into(),
            poll_interval_secs: 5,
            max_wait_secs: 300,
            timeout_secs: 30,
        }
    }
}

/// Plain JSON endpoint returning an array of alert records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    pub endpoint: String,
    /// Optional bearer token; empty means no authentication.
    pub token: SecretRef,
    pub timeout_secs: u64,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: SecretRef::default(),
            timeout_secs: 30,
        }
    }
}

/// Which actionability policy to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Severity alone decides.
    Simple,
    /// Count independent indicators against a threshold.
    #[default]
    Scored,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Simple => write!(f, "simple"),
            PolicyKind::Scored => write!(f, "scored"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(PolicyKind::Simple),
            "scored" => Ok(PolicyKind::Scored),
            other => Err(format!("unknown policy '{other}' (expected simple or scored)")),
        }
    }
}

/// Which addresses the internal-network indicator inspects.
///
/// The indicator contributes at most 1 regardless of mode, so purely
/// internal traffic is never double counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalAddressMatch {
    /// Source or destination is internal.
    #[default]
    Either,
    /// Only the source address is checked.
    Source,
    /// Only the destination address is checked.
    Destination,
    /// Both ends must be internal (east-west traffic).
    Both,
}

/// Actionability classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub policy: PolicyKind,
    /// Minimum indicator score for the scored policy.
    pub threshold: usize,
    pub actionable_severities: Vec<String>,
    pub description_keywords: Vec<String>,
    pub title_keywords: Vec<String>,
    pub detection_rule_keywords: Vec<String>,
    /// Account names that do not count as a real affected user.
    pub excluded_users: Vec<String>,
    pub internal_ip_prefixes: Vec<String>,
    pub internal_address_match: InternalAddressMatch,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Scored,
            threshold: 2,
            actionable_severities: strings(&["high", "critical"]),
            description_keywords: strings(&[
                "malware",
                "ransomware",
                "breach",
                "exfiltration",
                "lateral movement",
                "privilege escalation",
                "backdoor",
            ]),
            title_keywords: strings(&["attack", "compromise", "suspicious", "unauthorized"]),
            detection_rule_keywords: strings(&["apt", "threat", "exploit", "persistence"]),
            excluded_users: strings(&["system", "service", "unknown"]),
            internal_ip_prefixes: strings(&["10.", "192.168.", "172.16.", "172.17.", "172.18."]),
            internal_address_match: InternalAddressMatch::Either,
        }
    }
}

/// Issue tracker (Jira) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL, e.g. `https://example.atlassian.net`
    pub url: String,
    pub username: String,
    pub api_token: SecretRef,
    pub project_key: String,
    pub issue_type: String,
    /// Prepended to the alert title to form the ticket summary.
    pub summary_prefix: String,
    /// Labels added to every ticket after the built-in ones.
    pub labels: Vec<String>,
    /// Link to the SIEM search UI, rendered under "Quick Links".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    /// Link to the response playbook, rendered under "Quick Links".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            api_token: SecretRef::default(),
            project_key: "SEC".into(),
            issue_type: "Task".into(),
            summary_prefix: "Security Alert: ".into(),
            labels: strings(&["automated-triage"]),
            search_url: None,
            playbook_url: None,
            timeout_secs: 30,
        }
    }
}

/// Values supplied on the command line, applied after all other layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub time_window: Option<TimeWindow>,
    pub test_mode: Option<bool>,
    pub threshold: Option<usize>,
    pub policy: Option<PolicyKind>,
}

impl TriageConfig {
    /// Apply command-line overrides in place.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(window) = overrides.time_window {
            self.time_window = window;
        }
        if let Some(test_mode) = overrides.test_mode {
            self.test_mode = test_mode;
        }
        if let Some(threshold) = overrides.threshold {
            self.classifier.threshold = threshold;
        }
        if let Some(policy) = overrides.policy {
            self.classifier.policy = policy;
        }
    }

    /// Validate everything a run needs before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = self.source.as_ref().ok_or_else(|| {
            ConfigError::invalid(
                "source",
                "no alert source configured (set [source] kind = splunk | sumo_logic | http)",
            )
        })?;
        check_url("source.endpoint", source.endpoint())?;

        if self.max_alerts == 0 {
            return Err(ConfigError::invalid("max_alerts", "must be at least 1"));
        }
        if self.time_window.as_duration().is_zero() {
            return Err(ConfigError::invalid("time_window", "must be non-zero"));
        }

        self.classifier.validate()?;

        if !self.test_mode {
            check_url("tracker.url", &self.tracker.url)?;
            if self.tracker.project_key.trim().is_empty() {
                return Err(ConfigError::invalid("tracker.project_key", "must not be empty"));
            }
            if self.tracker.issue_type.trim().is_empty() {
                return Err(ConfigError::invalid("tracker.issue_type", "must not be empty"));
            }
        }

        Ok(())
    }

    /// Copy of this configuration with every inline credential masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.source = self.source.as_ref().map(SourceConfig::redacted);
        copy.tracker.api_token = redact(&self.tracker.api_token);
        copy
    }

    /// Render the redacted configuration as TOML.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.redacted()).map_err(|e| ConfigError::Load {
            message: format!("failed to render configuration: {e}"),
        })
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actionable_severities.is_empty() {
            return Err(ConfigError::invalid(
                "classifier.actionable_severities",
                "must list at least one severity",
            ));
        }
        if self.policy == PolicyKind::Scored {
            if self.threshold == 0 || self.threshold > STANDARD_INDICATOR_COUNT {
                return Err(ConfigError::invalid(
                    "classifier.threshold",
                    format!(
                        "must be between 1 and {STANDARD_INDICATOR_COUNT}, got {}",
                        self.threshold
                    ),
                ));
            }
            if self.internal_ip_prefixes.iter().all(|p| p.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    "classifier.internal_ip_prefixes",
                    "must list at least one prefix",
                ));
            }
        }
        Ok(())
    }
}

fn redact(secret: &SecretRef) -> SecretRef {
    SecretRef::from(secret.redacted())
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ConfigError::invalid(
            field,
            format!("'{value}' is not an http(s) URL"),
        ));
    }
    Ok(())
}

/// Name of the workspace-local configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "sieve.toml";

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `SIEVE_`, `__` for nesting)
/// 2. The explicit config file, if given (TOML, or JSON by extension);
///    otherwise workspace `sieve.toml` over user `~/.config/sieve/config.toml`
/// 3. Built-in defaults
///
/// CLI overrides are applied afterwards with [`TriageConfig::apply_overrides`].
pub fn load_config(
    explicit: Option<&Path>,
    workspace: Option<&Path>,
) -> Result<TriageConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TriageConfig::default()));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Load {
                message: format!("configuration file not found: {}", path.display()),
            });
        }
        figment = merge_file(figment, path);
    } else {
        if let Some(dirs) = directories::ProjectDirs::from("dev", "sieve", "sieve") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                figment = figment.merge(Toml::file(&user_config));
            }
        }
        if let Some(ws) = workspace {
            let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(&ws_config));
            }
        }
    }

    // Environment variables (SIEVE_TRACKER__PROJECT_KEY, SIEVE_TEST_MODE, etc.)
    figment = figment.merge(Env::prefixed("SIEVE_").split("__"));

    let config: TriageConfig = figment.extract()?;
    tracing::debug!(
        source = config.source.as_ref().map(|s| s.label()).unwrap_or("none"),
        policy = %config.classifier.policy,
        "Configuration loaded"
    );
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    }
}
