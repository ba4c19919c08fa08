//! Implementation of the `covgate snapshot` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::audit::NullAuditSink;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{
    AggregateSnapshot, BranchParseFailure, Config, Evaluation, GateSettings, ReportErrorEntry,
    ReportId, ReportSource,
};
use crate::services::{GateService, ThresholdEvaluator};

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Cobertura report to include (repeatable)
    #[arg(short, long = "report", value_name = "PATH")]
    pub reports: Vec<PathBuf>,

    /// Write the aggregate snapshot JSON to this file
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotOutput {
    pub coverage: AggregateSnapshot,
    pub coverage_sources: Vec<ReportId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub report_errors: Vec<ReportErrorEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branch_parse_failures: Vec<BranchParseFailure>,
    /// Configured thresholds applied to the snapshot, for display only
    #[serde(skip)]
    pub evaluation: Evaluation,
}

impl CommandOutput for SnapshotOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut lines = vec![format!(
            "Union of {} report(s), method {}",
            self.coverage_sources.len(),
            self.coverage.method()
        )];
        lines.push(formatter.format_coverage(&self.coverage, &self.evaluation));
        if !self.report_errors.is_empty() {
            lines.push(formatter.format_report_errors(&self.report_errors));
        }
        for failure in &self.branch_parse_failures {
            lines.push(format!(
                "unreadable condition coverage at {}:{}: '{}'",
                failure.file_path, failure.line_number, failure.raw
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SnapshotArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let settings = GateSettings::try_from(config)?;
    let evaluator = ThresholdEvaluator::new(settings.thresholds);

    // Aggregation never reaches the auditor, so no sink is needed.
    let service = GateService::new(settings, Arc::new(NullAuditSink));
    let aggregation = service
        .snapshot(args.reports.into_iter().map(ReportSource::Path).collect())
        .await?;

    if let Some(path) = &args.out {
        let json = serde_json::to_string_pretty(&aggregation.snapshot)?;
        tokio::fs::write(path, format!("{json}\n"))
            .await
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
    }

    let result = SnapshotOutput {
        evaluation: evaluator.evaluate(&aggregation.snapshot),
        coverage: aggregation.snapshot,
        coverage_sources: aggregation.coverage_sources,
        report_errors: aggregation
            .report_errors
            .iter()
            .map(ReportErrorEntry::from)
            .collect(),
        branch_parse_failures: aggregation.branch_parse_failures,
    };
    output(&result, json_mode);
    Ok(0)
}
