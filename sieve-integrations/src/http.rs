//! Shared reqwest plumbing for the backends.

use std::time::Duration;

use serde::de::DeserializeOwned;
use sieve_core::error::{ConfigError, SourceError, body_excerpt};
use url::Url;

/// Client builder with the per-backend request timeout applied.
pub(crate) fn client_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("sieve/", env!("CARGO_PKG_VERSION")))
}

pub(crate) fn build_client(
    builder: reqwest::ClientBuilder,
) -> Result<reqwest::Client, ConfigError> {
    builder.build().map_err(|e| ConfigError::Load {
        message: format!("failed to build HTTP client: {e}"),
    })
}

/// Parse a configured endpoint; it must be an http(s) base URL.
pub(crate) fn parse_endpoint(field: &str, endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| ConfigError::invalid(field, format!("not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::invalid(field, "must be an http(s) URL"));
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn api_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Map a transport failure to a source error.
pub(crate) fn request_error(backend: &str, e: reqwest::Error) -> SourceError {
    let message = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    SourceError::Request {
        backend: backend.to_string(),
        message,
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    backend: &str,
    resp: reqwest::Response,
) -> Result<T, SourceError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| request_error(backend, e))?;

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: body_excerpt(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| SourceError::Parse {
        message: format!("{backend}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_appends_segments() {
        let base = parse_endpoint("source.endpoint", "https://splunk.example.com:8089/").unwrap();
        let url = api_url(&base, &["services", "search", "jobs", "1700.12"]);
        assert_eq!(
            url.as_str(),
            "https://splunk.example.com:8089/services/search/jobs/1700.12"
        );
    }

    #[test]
    fn test_api_url_keeps_base_path() {
        let base = parse_endpoint("tracker.url", "https://example.com/jira").unwrap();
        let url = api_url(&base, &["rest", "api", "2", "issue"]);
        assert_eq!(url.as_str(), "https://example.com/jira/rest/api/2/issue");
    }

    #[test]
    fn test_api_url_encodes_segments() {
        let base = parse_endpoint("source.endpoint", "https://siem.example.com").unwrap();
        let url = api_url(&base, &["jobs", "a b/c"]);
        assert_eq!(url.as_str(), "https://siem.example.com/jobs/a%20b%2Fc");
    }

    #[test]
    fn test_parse_endpoint_rejects_non_http() {
        assert!(parse_endpoint("source.endpoint", "ftp://siem.example.com").is_err());
        assert!(parse_endpoint("source.endpoint", "not a url").is_err());
    }
}
