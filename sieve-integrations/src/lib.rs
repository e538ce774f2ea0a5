//! # Sieve Integrations
//!
//! Concrete SIEM search backends and issue trackers for Sieve.
//! Provides Splunk, Sumo Logic and plain HTTP JSON alert sources, and a Jira
//! ticket tracker, plus constructors that turn configuration into ready
//! components.

mod http;
pub mod http_json;
pub mod jira;
pub mod splunk;
pub mod sumo_logic;

pub use http_json::HttpJsonSource;
pub use jira::JiraTracker;
pub use splunk::SplunkSource;
pub use sumo_logic::SumoLogicSource;

use sieve_core::classifier::build_policy;
use sieve_core::config::{SourceConfig, TrackerConfig, TriageConfig};
use sieve_core::error::ConfigError;
use sieve_core::filer::TicketFiler;
use sieve_core::pipeline::TriagePipeline;
use sieve_core::secret_ref::SecretResolver;
use sieve_core::source::AlertSource;
use sieve_core::ticket::{TicketTemplate, TicketTracker};

/// Build the configured alert source, resolving its credentials.
pub fn build_source(config: &SourceConfig) -> Result<Box<dyn AlertSource>, ConfigError> {
    let source: Box<dyn AlertSource> = match config {
        SourceConfig::Splunk(c) => {
            let password = SecretResolver::resolve("source.password", &c.password)?;
            Box::new(SplunkSource::new(c, password)?)
        }
        SourceConfig::SumoLogic(c) => {
            let access_id = SecretResolver::resolve("source.access_id", &c.access_id)?;
            let access_key = SecretResolver::resolve("source.access_key", &c.access_key)?;
            Box::new(SumoLogicSource::new(c, access_id, access_key)?)
        }
        SourceConfig::Http(c) => {
            let token = if c.token.is_empty() {
                None
            } else {
                Some(SecretResolver::resolve("source.token", &c.token)?)
            };
            Box::new(HttpJsonSource::new(c, token)?)
        }
    };
    Ok(source)
}

/// Build the Jira tracker, resolving its API token.
pub fn build_tracker(config: &TrackerConfig) -> Result<Box<dyn TicketTracker>, ConfigError> {
    let api_token = SecretResolver::resolve("tracker.api_token", &config.api_token)?;
    Ok(Box::new(JiraTracker::new(config, api_token)?))
}

/// Validate `config` and assemble a pipeline from it.
///
/// In test mode the tracker is never constructed, so its credentials are not
/// required.
pub fn build_pipeline(config: &TriageConfig) -> Result<TriagePipeline, ConfigError> {
    config.validate()?;
    let source_config = config
        .source
        .as_ref()
        .ok_or_else(|| ConfigError::invalid("source", "no alert source configured"))?;

    let source = build_source(source_config)?;
    let policy = build_policy(&config.classifier);
    let template = TicketTemplate::from_config(&config.tracker, Some(source_config));
    let filer = if config.test_mode {
        TicketFiler::dry_run(template)
    } else {
        TicketFiler::new(build_tracker(&config.tracker)?, template)
    };

    tracing::debug!(
        source = source.name(),
        policy = policy.name(),
        test_mode = config.test_mode,
        "Pipeline assembled"
    );
    Ok(TriagePipeline::new(source, policy, filer))
}
