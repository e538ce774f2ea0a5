//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::RunArgs;
use sieve_core::alert::{Alert, read_alerts};
use sieve_core::classifier::{Assessment, build_policy};
use sieve_core::config::{
    ConfigOverrides, PolicyKind, SourceConfig, SplunkConfig, TimeWindow, TriageConfig,
    WORKSPACE_CONFIG_FILE, load_config,
};
use sieve_core::filer::priority_for;
use sieve_core::pipeline::TriageReport;
use sieve_core::secret_ref::SecretRef;
use sieve_core::source::AlertQuery;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status used by `run --strict` when anything failed.
const EXIT_STRICT_FAILURE: u8 = 2;

/// Where configuration is looked up.
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub workspace: PathBuf,
}

impl Context {
    fn load(&self) -> anyhow::Result<TriageConfig> {
        load_config(self.config_path.as_deref(), Some(&self.workspace))
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run(args) => handle_run(args, ctx).await,
        Commands::Classify {
            file,
            policy,
            threshold,
        } => handle_classify(&file, policy, threshold, ctx).map(|()| ExitCode::SUCCESS),
        Commands::Config { action } => handle_config(action, ctx).map(|()| ExitCode::SUCCESS),
    }
}

fn run_overrides(args: &RunArgs) -> anyhow::Result<ConfigOverrides> {
    let hours = match args.hours {
        Some(hours) => Some(
            TimeWindow::from_hours(hours)
                .ok_or_else(|| anyhow::anyhow!("--hours {hours} is too large"))?,
        ),
        None => None,
    };
    Ok(ConfigOverrides {
        time_window: args.window.or(hours),
        // --test only ever switches test mode on; the config may already enable it.
        test_mode: args.test.then_some(true),
        threshold: args.threshold,
        policy: None,
    })
}

/// Process exit status for a finished run.
fn exit_status(report: &TriageReport, strict: bool) -> u8 {
    if strict && report.has_failures() {
        EXIT_STRICT_FAILURE
    } else {
        0
    }
}

async fn handle_run(args: RunArgs, ctx: &Context) -> anyhow::Result<ExitCode> {
    let mut config = ctx.load()?;
    config.apply_overrides(&run_overrides(&args)?);

    let pipeline = sieve_integrations::build_pipeline(&config)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let query = AlertQuery::ending_now(config.time_window.as_duration(), config.max_alerts);
    let report = pipeline.run(&query).await;
    report.log_summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let code = exit_status(&report, args.strict);
    if code != 0 {
        tracing::error!(exit_code = code, "Run finished with failures (--strict)");
    }
    Ok(ExitCode::from(code))
}

fn handle_classify(
    file: &Path,
    policy: Option<PolicyKind>,
    threshold: Option<usize>,
    ctx: &Context,
) -> anyhow::Result<()> {
    let mut config = ctx.load()?;
    config.apply_overrides(&ConfigOverrides {
        threshold,
        policy,
        ..Default::default()
    });
    config
        .classifier
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let alerts = read_alerts(file)
        .map_err(|e| anyhow::anyhow!("Failed to read alerts from {}: {}", file.display(), e))?;
    let policy = build_policy(&config.classifier);

    let mut actionable = 0;
    for alert in &alerts {
        let assessment = policy.assess(alert);
        if assessment.actionable {
            actionable += 1;
        }
        println!("{}", format_assessment(alert, &assessment));
    }
    println!(
        "\n{} alerts, {} actionable ({} policy)",
        alerts.len(),
        actionable,
        policy.name()
    );
    Ok(())
}

fn format_assessment(alert: &Alert, assessment: &Assessment) -> String {
    let verdict = if assessment.actionable {
        format!("FILE [{}]", priority_for(alert))
    } else {
        "skip".to_string()
    };
    format!(
        "{:<16} {:<24} {}: {}",
        verdict,
        alert.id,
        alert.display_title(),
        assessment
    )
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = ctx.workspace.join(WORKSPACE_CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            std::fs::write(&config_path, starter_config().to_redacted_toml()?)?;
            println!(
                "Created starter configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = ctx.load()?;
            println!("{}", config.to_redacted_toml()?);
            Ok(())
        }
        ConfigAction::Check => {
            let config = ctx.load()?;
            sieve_integrations::build_pipeline(&config)
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            let source = config.source.as_ref().map(|s| s.label()).unwrap_or("none");
            tracing::info!(
                source,
                policy = %config.classifier.policy,
                test_mode = config.test_mode,
                "Configuration check passed"
            );
            if config.test_mode {
                println!(
                    "Configuration OK: source={}, policy={}, test mode (tracker not contacted)",
                    source, config.classifier.policy
                );
            } else {
                println!(
                    "Configuration OK: source={}, policy={}, tracker={} project={}",
                    source, config.classifier.policy, config.tracker.url, config.tracker.project_key
                );
            }
            Ok(())
        }
    }
}

/// Defaults plus placeholder endpoints and env-referenced credentials.
fn starter_config() -> TriageConfig {
    let mut config = TriageConfig {
        source: Some(SourceConfig::Splunk(SplunkConfig {
            endpoint: "https://splunk.example.com:8089".into(),
            username: "svc_triage".into(),
            password: SecretRef::env("SPLUNK_PASSWORD"),
            ..Default::default()
        })),
        ..Default::default()
    };
    config.tracker.url = "https://example.atlassian.net".into();
    config.tracker.username = "triage-bot@example.com".into();
    config.tracker.api_token = SecretRef::env("JIRA_API_TOKEN");
    config
}
