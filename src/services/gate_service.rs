//! End-to-end coverage gate pipeline.
//!
//! ingest (fan-out, one blocking task per report) → fold → evaluate →
//! decide → summary.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::errors::{GateError, GateResult, ReportParseError};
use crate::domain::models::{
    AggregateSnapshot, AppliedOverride, BranchParseFailure, GateSettings, ReportErrorEntry,
    ReportId, ReportPolicy, ReportSource, RunSummary, TestOutcome,
};
use crate::domain::ports::AuditSink;
use crate::services::override_auditor::OverrideAuditor;
use crate::services::report_ingestor::ReportIngestor;
use crate::services::threshold_evaluator::ThresholdEvaluator;
use crate::services::union_aggregator::CoverageAccumulator;

/// Inputs of one gate run.
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub reports: Vec<ReportSource>,
    pub tests: TestOutcome,
}

/// Union of every report that parsed, plus what was left out.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub snapshot: AggregateSnapshot,
    pub coverage_sources: Vec<ReportId>,
    pub report_errors: Vec<ReportParseError>,
    pub branch_parse_failures: Vec<BranchParseFailure>,
}

/// Read one report into its own accumulator. A report is all or nothing.
fn ingest(source: &ReportSource) -> Result<CoverageAccumulator, ReportParseError> {
    let mut accumulator = CoverageAccumulator::new();
    for fact in ReportIngestor::open(source)? {
        accumulator.absorb(fact?);
    }
    Ok(accumulator)
}

/// Ingest reports in parallel and fold them in input order.
///
/// Parse errors are collected, not raised; the caller applies its policy.
pub async fn aggregate(reports: Vec<ReportSource>) -> GateResult<Aggregation> {
    let handles = reports.into_iter().map(|source| {
        tokio::task::spawn_blocking(move || {
            let id = source.id();
            (id, ingest(&source))
        })
    });

    let mut union = CoverageAccumulator::new();
    let mut coverage_sources = Vec::new();
    let mut report_errors = Vec::new();

    for joined in join_all(handles).await {
        let (id, result) = joined.map_err(|err| GateError::Worker(err.to_string()))?;
        match result {
            Ok(partial) => {
                debug!(report = %id, lines = partial.line_count(), "merging report");
                union.merge(partial);
                coverage_sources.push(id);
            }
            Err(err) => {
                warn!(report = %err.report, error = %err.kind, "excluding coverage report");
                report_errors.push(err);
            }
        }
    }

    Ok(Aggregation {
        snapshot: union.snapshot(),
        coverage_sources,
        report_errors,
        branch_parse_failures: union.branch_parse_failures(),
    })
}

/// Runs the coverage gate for a validated configuration.
pub struct GateService {
    settings: GateSettings,
    evaluator: ThresholdEvaluator,
    auditor: OverrideAuditor,
}

impl GateService {
    pub fn new(settings: GateSettings, sink: Arc<dyn AuditSink>) -> Self {
        let evaluator = ThresholdEvaluator::new(settings.thresholds);
        let auditor =
            OverrideAuditor::new(sink, settings.overrides.clone(), settings.metadata.clone());
        Self {
            settings,
            evaluator,
            auditor,
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Ingest and aggregate only, honouring the report policy.
    pub async fn snapshot(&self, reports: Vec<ReportSource>) -> GateResult<Aggregation> {
        let aggregation = aggregate(reports).await?;
        if self.settings.report_policy == ReportPolicy::Fail && !aggregation.report_errors.is_empty()
        {
            return Err(GateError::Report(aggregation.report_errors));
        }
        Ok(aggregation)
    }

    pub async fn run(&self, request: GateRequest) -> GateResult<RunSummary> {
        let aggregation = self.snapshot(request.reports).await?;
        let snapshot = aggregation.snapshot;

        let evaluation = self.evaluator.evaluate(&snapshot);
        info!(
            verdict = %evaluation.verdict,
            line_pct = snapshot.line_pct(),
            branch_pct = snapshot.branch_pct(),
            reports = aggregation.coverage_sources.len(),
            "Coverage evaluated"
        );

        let decision = self
            .auditor
            .decide(
                &evaluation,
                &snapshot,
                self.evaluator.thresholds(),
                request.tests,
            )
            .await?;
        info!(status = %decision.status, "Gate run finished");

        Ok(RunSummary {
            status: decision.status,
            coverage: snapshot,
            thresholds: *self.evaluator.thresholds(),
            threshold_ok: evaluation.verdict.is_passing(),
            verdict: evaluation.verdict,
            evaluation,
            tests: request.tests,
            coverage_sources: aggregation.coverage_sources,
            applied_override: decision.record.as_ref().map(AppliedOverride::from),
            report_errors: aggregation
                .report_errors
                .iter()
                .map(ReportErrorEntry::from)
                .collect(),
            branch_parse_failures: aggregation.branch_parse_failures,
        })
    }
}
