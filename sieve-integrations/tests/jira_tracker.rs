//! Jira tracker tests against a mock REST API.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sieve_core::alert::{Alert, Severity};
use sieve_core::config::TrackerConfig;
use sieve_core::error::TrackerError;
use sieve_core::filer::{FilingOutcome, TicketFiler};
use sieve_core::ticket::{TicketRequest, TicketTemplate, TicketTracker};
use sieve_integrations::JiraTracker;
use sieve_integrations::jira::UNKNOWN_ISSUE_KEY;

fn tracker(server: &MockServer) -> JiraTracker {
    let config = TrackerConfig {
        url: server.uri(),
        username: "triage-bot@example.com".into(),
        timeout_secs: 5,
        ..Default::default()
    };
    JiraTracker::new(&config, "api-token".into()).unwrap()
}

fn request_alert() -> Alert {
    Alert {
        id: "A-1".into(),
        title: "Data Breach Detected".into(),
        severity: Severity::Critical,
        ..Default::default()
    }
}

fn request() -> TicketRequest {
    TicketTemplate::default().build(&request_alert(), None)
}

#[tokio::test]
async fn create_issue_posts_fields_and_returns_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .and(basic_auth("triage-bot@example.com", "api-token"))
        .and(body_partial_json(json!({
            "fields": {
                "project": {"key": "SEC"},
                "summary": "Security Alert: Data Breach Detected",
                "issuetype": {"name": "Task"},
                "priority": {"name": "Highest"},
                "labels": ["security-alert", "siem", "severity-critical", "automated-triage"]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "10042",
            "key": "SEC-42",
            "self": "https://example.atlassian.net/rest/api/2/issue/10042"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ticket = tracker(&server).create_issue(&request()).await.unwrap();
    assert_eq!(ticket.key, "SEC-42");
    assert_eq!(ticket.url, Some(format!("{}/browse/SEC-42", server.uri())));
}

#[tokio::test]
async fn any_2xx_with_key_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "SEC-7"})))
        .mount(&server)
        .await;

    let ticket = tracker(&server).create_issue(&request()).await.unwrap();
    assert_eq!(ticket.key, "SEC-7");
}

#[tokio::test]
async fn validation_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorMessages": [],
            "errors": {"priority": "Priority name 'Highest' is not valid"}
        })))
        .mount(&server)
        .await;

    let err = tracker(&server).create_issue(&request()).await.unwrap_err();
    match err {
        TrackerError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Priority name"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn created_without_key_is_still_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;

    let ticket = tracker(&server).create_issue(&request()).await.unwrap();
    assert_eq!(ticket.key, UNKNOWN_ISSUE_KEY);
    assert_eq!(ticket.url, None);
}

#[tokio::test]
async fn filer_counts_201_with_only_id_as_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10042"})))
        .expect(1)
        .mount(&server)
        .await;

    let filer = TicketFiler::new(Box::new(tracker(&server)), TicketTemplate::default());
    let outcome = filer.file(&request_alert()).await;
    assert_eq!(
        outcome,
        FilingOutcome::Created {
            key: UNKNOWN_ISSUE_KEY.into(),
            url: None,
        }
    );
}

#[tokio::test]
async fn other_2xx_without_key_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let err = tracker(&server).create_issue(&request()).await.unwrap_err();
    assert!(matches!(err, TrackerError::Parse { .. }));
}

#[tokio::test]
async fn filer_reports_failure_and_sends_one_request_per_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(2)
        .mount(&server)
        .await;

    let filer = TicketFiler::new(Box::new(tracker(&server)), TicketTemplate::default());
    let alert = Alert {
        title: "Lateral Movement".into(),
        severity: Severity::High,
        ..Default::default()
    };

    for _ in 0..2 {
        let outcome = filer.file(&alert).await;
        assert!(matches!(outcome, FilingOutcome::Failed { ref reason } if reason.contains("500")));
    }
}

#[tokio::test]
async fn unreachable_tracker_is_a_request_error() {
    let server = MockServer::start().await;
    let tracker = tracker(&server);
    drop(server);

    let err = tracker.create_issue(&request()).await.unwrap_err();
    assert!(matches!(err, TrackerError::Request { .. }));
}
