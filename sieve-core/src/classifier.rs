//! Actionability classifier: decides whether an alert warrants a ticket.
//!
//! Two policies are provided:
//! - [`SeverityPolicy`]: actionable iff severity is in the actionable set.
//! - [`ScoredPolicy`]: an ordered list of named [`Indicator`]s, each worth one
//!   point; actionable iff the score reaches the threshold.
//!
//! Policies are pure: no state is kept between calls, so evaluating alerts in
//! any order yields the same individual decisions.

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::config::{ClassifierConfig, InternalAddressMatch, PolicyKind};

/// Number of indicators in [`ScoredPolicy::standard`].
pub const STANDARD_INDICATOR_COUNT: usize = 6;

/// Explainable result of evaluating one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Number of indicators that fired.
    pub score: usize,
    /// Number of indicators evaluated.
    pub max_score: usize,
    /// Score required to be actionable.
    pub threshold: usize,
    /// Names of the indicators that fired, in evaluation order.
    pub fired: Vec<String>,
    pub actionable: bool,
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "score {}/{} (threshold {})",
            self.score, self.max_score, self.threshold
        )?;
        if !self.fired.is_empty() {
            write!(f, " [{}]", self.fired.join(", "))?;
        }
        Ok(())
    }
}

/// A strategy deciding whether an alert is actionable.
pub trait ActionabilityPolicy: Send + Sync {
    /// Short policy name for logs.
    fn name(&self) -> &str;

    /// Evaluate an alert.
    fn assess(&self, alert: &Alert) -> Assessment;

    /// Convenience wrapper returning only the decision.
    fn classify(&self, alert: &Alert) -> bool {
        self.assess(alert).actionable
    }
}

/// Severity-only policy.
pub struct SeverityPolicy {
    severities: Vec<String>,
}

impl SeverityPolicy {
    /// `severities` are compared case-insensitively.
    pub fn new(severities: &[String]) -> Self {
        Self {
            severities: fold_all(severities),
        }
    }
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default().actionable_severities)
    }
}

impl ActionabilityPolicy for SeverityPolicy {
    fn name(&self) -> &str {
        "simple"
    }

    fn assess(&self, alert: &Alert) -> Assessment {
        let hit = self
            .severities
            .iter()
            .any(|s| s == alert.severity.as_str());
        Assessment {
            score: usize::from(hit),
            max_score: 1,
            threshold: 1,
            fired: if hit { vec!["severity".into()] } else { vec![] },
            actionable: hit,
        }
    }
}

type Predicate = Box<dyn Fn(&Alert) -> bool + Send + Sync>;

/// A named boolean check contributing one point to a score.
pub struct Indicator {
    name: String,
    predicate: Predicate,
}

impl Indicator {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Alert) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, alert: &Alert) -> bool {
        (self.predicate)(alert)
    }
}

impl std::fmt::Debug for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indicator").field("name", &self.name).finish()
    }
}

/// Scores an alert by counting the indicators that hold.
#[derive(Debug)]
pub struct ScoredPolicy {
    indicators: Vec<Indicator>,
    threshold: usize,
}

impl ScoredPolicy {
    /// An empty policy; add indicators with [`ScoredPolicy::with_indicator`].
    pub fn new(threshold: usize) -> Self {
        Self {
            indicators: Vec::new(),
            threshold,
        }
    }

    /// Append an indicator. Evaluation order follows insertion order.
    pub fn with_indicator(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Alert) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.indicators.push(Indicator::new(name, predicate));
        self
    }

    /// The six standard indicators, parameterized by configuration.
    pub fn standard(config: &ClassifierConfig) -> Self {
        let severities = fold_all(&config.actionable_severities);
        let description_keywords = fold_all(&config.description_keywords);
        let title_keywords = fold_all(&config.title_keywords);
        let rule_keywords = fold_all(&config.detection_rule_keywords);
        let excluded_users = fold_all(&config.excluded_users);
        let prefixes: Vec<String> = config
            .internal_ip_prefixes
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let address_match = config.internal_address_match;

        Self::new(config.threshold)
            .with_indicator("severity", move |a| {
                severities.iter().any(|s| s == a.severity.as_str())
            })
            .with_indicator("description_keywords", move |a| {
                contains_any(&a.description, &description_keywords)
            })
            .with_indicator("title_keywords", move |a| {
                contains_any(&a.title, &title_keywords)
            })
            .with_indicator("internal_address", move |a| {
                is_internal_involved(a, &prefixes, address_match)
            })
            .with_indicator("named_user", move |a| {
                is_named_user(a.affected_user.as_deref(), &excluded_users)
            })
            .with_indicator("detection_rule_keywords", move |a| {
                contains_any(a.detection_rule.as_deref().unwrap_or(""), &rule_keywords)
            })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }
}

impl ActionabilityPolicy for ScoredPolicy {
    fn name(&self) -> &str {
        "scored"
    }

    fn assess(&self, alert: &Alert) -> Assessment {
        let fired: Vec<String> = self
            .indicators
            .iter()
            .filter(|i| i.evaluate(alert))
            .map(|i| i.name.clone())
            .collect();
        let score = fired.len();
        Assessment {
            score,
            max_score: self.indicators.len(),
            threshold: self.threshold,
            fired,
            actionable: score >= self.threshold,
        }
    }
}

/// Build the configured policy.
pub fn build_policy(config: &ClassifierConfig) -> Box<dyn ActionabilityPolicy> {
    match config.policy {
        PolicyKind::Simple => Box::new(SeverityPolicy::new(&config.actionable_severities)),
        PolicyKind::Scored => Box::new(ScoredPolicy::standard(config)),
    }
}

fn fold_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Case-insensitive substring match against pre-folded keywords.
fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    if haystack.is_empty() {
        return false;
    }
    let folded = haystack.to_lowercase();
    keywords.iter().any(|k| folded.contains(k.as_str()))
}

fn is_internal_involved(alert: &Alert, prefixes: &[String], mode: InternalAddressMatch) -> bool {
    let internal = |addr: Option<&str>| {
        addr.map(str::trim)
            .is_some_and(|ip| prefixes.iter().any(|p| ip.starts_with(p.as_str())))
    };
    let src = internal(alert.source_ip.as_deref());
    let dst = internal(alert.destination_ip.as_deref());
    match mode {
        InternalAddressMatch::Either => src || dst,
        InternalAddressMatch::Source => src,
        InternalAddressMatch::Destination => dst,
        InternalAddressMatch::Both => src && dst,
    }
}

/// Absent or blank users never count as named.
fn is_named_user(user: Option<&str>, excluded: &[String]) -> bool {
    match user.map(str::trim) {
        Some(u) if !u.is_empty() => {
            let folded = u.to_lowercase();
            !excluded.iter().any(|e| *e == folded)
        }
        _ => false,
    }
}
