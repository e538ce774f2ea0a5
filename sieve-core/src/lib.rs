//! # Sieve Core
//!
//! Core library for the Sieve SIEM alert triage pipeline.
//! Provides the alert model, the actionability classifier, ticket construction
//! and filing, the pipeline that ties them together, and configuration.
//! Concrete search backends and issue trackers live in `sieve-integrations`.

pub mod alert;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filer;
pub mod pipeline;
pub mod secret_ref;
pub mod source;
pub mod ticket;

// Re-export commonly used types at the crate root.
pub use alert::{Alert, AlertTimestamp, Severity};
pub use classifier::{
    ActionabilityPolicy, Assessment, Indicator, STANDARD_INDICATOR_COUNT, ScoredPolicy,
    SeverityPolicy, build_policy,
};
pub use config::{
    ClassifierConfig, ConfigOverrides, InternalAddressMatch, PolicyKind, SourceConfig,
    TimeWindow, TrackerConfig, TriageConfig, load_config,
};
pub use error::{ConfigError, Result, SieveError, SourceError, TrackerError};
pub use filer::{FilingOutcome, TicketFiler};
pub use pipeline::{AlertDisposition, RetrievalStatus, TriagePipeline, TriageReport, TriageSummary};
pub use secret_ref::{SecretRef, SecretResolver};
pub use source::{AlertQuery, AlertSource, Retrieval, retrieve};
pub use ticket::{CreatedTicket, Priority, TicketRequest, TicketTemplate, TicketTracker};
