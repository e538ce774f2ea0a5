//! Property-based tests for the actionability classifier using proptest.

use proptest::prelude::*;

use sieve_core::alert::{Alert, Severity};
use sieve_core::classifier::{
    ActionabilityPolicy, STANDARD_INDICATOR_COUNT, ScoredPolicy, SeverityPolicy,
};
use sieve_core::config::ClassifierConfig;

/// Build an alert where exactly the flagged standard indicators fire.
fn alert_with(flags: [bool; STANDARD_INDICATOR_COUNT]) -> Alert {
    let [severity, description, title, internal, user, rule] = flags;
    Alert {
        id: format!("{flags:?}"),
        severity: if severity { Severity::Critical } else { Severity::Low },
        description: if description {
            "Possible malware beacon".into()
        } else {
            "routine activity".into()
        },
        title: if title {
            "Suspicious login".into()
        } else {
            "Login".into()
        },
        source_ip: Some(if internal { "10.0.0.5" } else { "203.0.113.9" }.into()),
        affected_user: if user { Some("alice".into()) } else { None },
        detection_rule: Some(if rule { "APT beacon" } else { "baseline" }.into()),
        ..Default::default()
    }
}

fn flags_strategy() -> impl Strategy<Value = [bool; STANDARD_INDICATOR_COUNT]> {
    prop::array::uniform6(any::<bool>())
}

fn scored(threshold: usize) -> ScoredPolicy {
    ScoredPolicy::standard(&ClassifierConfig {
        threshold,
        ..Default::default()
    })
}

/// Random ASCII casing of `word`.
fn recase(word: &str, upper: &[bool]) -> String {
    word.chars()
        .zip(upper.iter().cycle())
        .map(|(c, &u)| if u { c.to_ascii_uppercase() } else { c })
        .collect()
}

// --- Scored policy properties ---

proptest! {
    #[test]
    fn score_counts_exactly_the_fired_indicators(
        flags in flags_strategy(),
        threshold in 1usize..=STANDARD_INDICATOR_COUNT,
    ) {
        let assessment = scored(threshold).assess(&alert_with(flags));
        let expected = flags.iter().filter(|f| **f).count();
        prop_assert_eq!(assessment.score, expected);
        prop_assert_eq!(assessment.max_score, STANDARD_INDICATOR_COUNT);
        prop_assert_eq!(assessment.actionable, expected >= threshold);
    }

    #[test]
    fn toggling_one_indicator_moves_score_by_one(
        flags in flags_strategy(),
        index in 0usize..STANDARD_INDICATOR_COUNT,
        threshold in 1usize..=STANDARD_INDICATOR_COUNT,
    ) {
        let policy = scored(threshold);
        let mut off = flags;
        off[index] = false;
        let mut on = flags;
        on[index] = true;

        let low = policy.assess(&alert_with(off));
        let high = policy.assess(&alert_with(on));
        prop_assert_eq!(high.score, low.score + 1);
        // The decision flips only when the threshold is crossed.
        prop_assert_eq!(high.actionable != low.actionable, high.score == threshold);
    }

    #[test]
    fn assessments_are_order_independent(
        batch in prop::collection::vec(flags_strategy(), 1..20),
    ) {
        let policy = scored(2);
        let alerts: Vec<Alert> = batch.into_iter().map(alert_with).collect();

        let forward: Vec<_> = alerts.iter().map(|a| policy.assess(a)).collect();
        let mut backward: Vec<_> = alerts.iter().rev().map(|a| policy.assess(a)).collect();
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn low_severity_alone_is_not_actionable(title in "[a-z ]{0,12}") {
        let alert = Alert {
            title,
            severity: Severity::Medium,
            ..Default::default()
        };
        // Only the title indicator could fire; threshold 2 needs another.
        prop_assert!(!scored(2).classify(&alert));
    }
}

// --- Simple policy properties ---

proptest! {
    #[test]
    fn simple_policy_ignores_severity_casing(
        critical in any::<bool>(),
        upper in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let word = if critical { "critical" } else { "high" };
        let alert = Alert {
            severity: Severity::parse(&recase(word, &upper)),
            ..Default::default()
        };
        prop_assert!(SeverityPolicy::default().classify(&alert));
    }

    #[test]
    fn simple_policy_rejects_lower_severities(
        medium in any::<bool>(),
        upper in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let word = if medium { "medium" } else { "low" };
        let alert = Alert {
            severity: Severity::parse(&recase(word, &upper)),
            title: "Unauthorized access attack".into(),
            ..Default::default()
        };
        prop_assert!(!SeverityPolicy::default().classify(&alert));
    }
}
