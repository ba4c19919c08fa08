//! Implementation of the `covgate check` command.

use anyhow::{Context, Result};
use clap::Args;
use figment::providers::Serialized;
use figment::Figment;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::adapters::audit::build_audit_sink;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, GateSettings, ReportSource, RunSummary, TestOutcome};
use crate::services::{GateRequest, GateService};

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Cobertura report to include (repeatable)
    #[arg(short, long = "report", value_name = "PATH")]
    pub reports: Vec<PathBuf>,

    /// Exit code of the test run that produced the reports
    #[arg(long, value_name = "CODE", allow_negative_numbers = true)]
    pub tests_exit_code: i32,

    /// Also write the run summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub summary_out: Option<PathBuf>,

    /// Minimum line coverage percentage (empty disables the gate)
    #[arg(long, value_name = "PERCENT")]
    pub lines_min: Option<String>,

    /// Minimum branch coverage percentage (empty disables the gate)
    #[arg(long, value_name = "PERCENT")]
    pub branches_min: Option<String>,

    /// Permit a failed coverage gate to be overridden
    #[arg(long)]
    pub override_allow: bool,

    /// Justification recorded in the audit log when overriding
    #[arg(long, value_name = "TEXT")]
    pub override_reason: Option<String>,

    /// CI run identifier recorded with an override
    #[arg(long)]
    pub run_id: Option<String>,

    /// Abort instead of excluding reports that fail to parse
    #[arg(long)]
    pub fail_on_report_error: bool,
}

impl CheckArgs {
    /// Layer command-line settings over the loaded configuration.
    pub fn apply(&self, mut figment: Figment) -> Figment {
        let strings = [
            ("gate.lines_min", &self.lines_min),
            ("gate.branches_min", &self.branches_min),
            ("gate.override_reason", &self.override_reason),
            ("run.run_id", &self.run_id),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                figment = figment.merge(Serialized::default(key, value.clone()));
            }
        }
        if self.override_allow {
            figment = figment.merge(Serialized::default("gate.override_allow", true));
        }
        if self.fail_on_report_error {
            figment = figment.merge(Serialized::default("gate.report_policy", "fail"));
        }
        figment
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct CheckOutput {
    pub summary: RunSummary,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let summary = &self.summary;
        let formatter = TableFormatter::new();
        let mut lines = vec![
            format!(
                "Status: {} (exit code {})",
                summary.status,
                summary.exit_code()
            ),
            format!(
                "Verdict: {} from {} report(s)",
                summary.verdict,
                summary.coverage_sources.len()
            ),
            formatter.format_coverage(&summary.coverage, &summary.evaluation),
        ];
        if let Some(applied) = &summary.applied_override {
            lines.push(format!("Override recorded: {}", applied.reason));
        }
        if !summary.report_errors.is_empty() {
            lines.push(formatter.format_report_errors(&summary.report_errors));
        }
        if !summary.branch_parse_failures.is_empty() {
            lines.push(format!(
                "{} branch line(s) had unreadable condition coverage",
                summary.branch_parse_failures.len()
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.summary).unwrap_or_default()
    }
}

pub async fn execute(args: CheckArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let settings = GateSettings::try_from(config)?;
    let sink = build_audit_sink(&config.audit);

    if args.reports.is_empty() {
        warn!("No coverage reports given; coverage is 0%");
    }

    let service = GateService::new(settings, sink);
    let summary = service
        .run(GateRequest {
            reports: args.reports.into_iter().map(ReportSource::Path).collect(),
            tests: TestOutcome::from_exit_code(args.tests_exit_code),
        })
        .await?;

    if let Some(path) = &args.summary_out {
        write_summary(path, &summary).await?;
    }

    let code = summary.exit_code();
    output(&CheckOutput { summary }, json_mode);
    Ok(code)
}

async fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, format!("{json}\n"))
        .await
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}
