//! Run lifecycle, final status, override records and the run summary.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::coverage::{BranchParseFailure, ReportId};
use super::snapshot::AggregateSnapshot;
use super::threshold::ThresholdConfig;
use super::verdict::{Evaluation, Verdict};
use crate::domain::errors::ReportParseError;

/// Result of the external test run that produced the reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub exit_code: i32,
}

impl TestOutcome {
    pub fn from_exit_code(exit_code: i32) -> Self {
        Self { exit_code }
    }

    pub fn passed() -> Self {
        Self { exit_code: 0 }
    }

    pub fn failed() -> Self {
        Self { exit_code: 1 }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Final status of a gate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    TestsFailed,
    CoverageFailed,
    CoverageOverridden,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::TestsFailed => "tests_failed",
            Self::CoverageFailed => "coverage_failed",
            Self::CoverageOverridden => "coverage_overridden",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "tests_failed" => Some(Self::TestsFailed),
            "coverage_failed" => Some(Self::CoverageFailed),
            "coverage_overridden" => Some(Self::CoverageOverridden),
            _ => None,
        }
    }

    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Ok | Self::CoverageOverridden => 0,
            Self::TestsFailed => 1,
            Self::CoverageFailed => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the single-run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    EvaluatingCoverage,
    AwaitingOverrideDecision,
    Finished(RunStatus),
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// Valid transitions from this phase. Terminal phases have none.
    pub fn valid_transitions(&self) -> Vec<RunPhase> {
        match self {
            Self::Pending => vec![Self::EvaluatingCoverage],
            Self::EvaluatingCoverage => vec![
                Self::Finished(RunStatus::Ok),
                Self::Finished(RunStatus::TestsFailed),
                Self::AwaitingOverrideDecision,
            ],
            Self::AwaitingOverrideDecision => vec![
                Self::Finished(RunStatus::CoverageFailed),
                Self::Finished(RunStatus::CoverageOverridden),
            ],
            Self::Finished(_) => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::EvaluatingCoverage => f.write_str("evaluating_coverage"),
            Self::AwaitingOverrideDecision => f.write_str("awaiting_override_decision"),
            Self::Finished(status) => write!(f, "finished({status})"),
        }
    }
}

/// Operator-controlled override inputs, already validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverridePolicy {
    /// Whether the override path is considered at all.
    pub allow: bool,
    reason: Option<String>,
}

impl OverridePolicy {
    pub fn new(allow: bool, reason: Option<&str>) -> Self {
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(ToString::to_string);
        Self { allow, reason }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// The trimmed, non-empty justification, if one was supplied.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Metadata identifying the CI run, copied into audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub run_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub git_ref: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub solution: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub configuration: Option<String>,
}

/// Accept strings as well as bare numbers/booleans for free-text settings.
///
/// Environment providers hand `GITHUB_RUN_ID=123` over as a number.
pub(crate) fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(Option::<Lenient>::deserialize(deserializer)?.map(|value| match value {
        Lenient::Text(text) => text,
        Lenient::Unsigned(n) => n.to_string(),
        Lenient::Signed(n) => n.to_string(),
        Lenient::Float(n) => n.to_string(),
        Lenient::Flag(b) => b.to_string(),
    }))
}

/// Immutable audit entry written when an override is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub ts: DateTime<Utc>,
    pub status: RunStatus,
    pub line_pct: f64,
    pub branch_pct: f64,
    pub lines_min: Option<f64>,
    pub branches_min: Option<f64>,
    pub override_reason: String,
    pub run_id: Option<String>,
    #[serde(default)]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub configuration: Option<String>,
}

impl OverrideRecord {
    /// Build the record for an accepted override, stamped now (UTC, whole seconds).
    pub fn new(
        reason: &str,
        snapshot: &AggregateSnapshot,
        thresholds: &ThresholdConfig,
        metadata: &RunMetadata,
    ) -> Self {
        Self {
            ts: Utc::now().trunc_subsecs(0),
            status: RunStatus::CoverageOverridden,
            line_pct: snapshot.line_pct(),
            branch_pct: snapshot.branch_pct(),
            lines_min: thresholds.lines_min.minimum(),
            branches_min: thresholds.branches_min.minimum(),
            override_reason: reason.to_string(),
            run_id: metadata.run_id.clone(),
            git_ref: metadata.git_ref.clone(),
            solution: metadata.solution.clone(),
            configuration: metadata.configuration.clone(),
        }
    }
}

/// Summary of an accepted override, embedded in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedOverride {
    pub reason: String,
    pub line_pct: f64,
    pub branch_pct: f64,
    pub lines_min: Option<f64>,
    pub branches_min: Option<f64>,
}

impl From<&OverrideRecord> for AppliedOverride {
    fn from(record: &OverrideRecord) -> Self {
        Self {
            reason: record.override_reason.clone(),
            line_pct: record.line_pct,
            branch_pct: record.branch_pct,
            lines_min: record.lines_min,
            branches_min: record.branches_min,
        }
    }
}

/// A report excluded from the union, as shown in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportErrorEntry {
    pub report: ReportId,
    pub error: String,
}

impl From<&ReportParseError> for ReportErrorEntry {
    fn from(err: &ReportParseError) -> Self {
        Self {
            report: err.report.clone(),
            error: err.kind.to_string(),
        }
    }
}

/// Everything a run produced, as handed to summary writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub coverage: AggregateSnapshot,
    pub thresholds: ThresholdConfig,
    pub threshold_ok: bool,
    pub verdict: Verdict,
    pub evaluation: Evaluation,
    pub tests: TestOutcome,
    pub coverage_sources: Vec<ReportId>,
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub applied_override: Option<AppliedOverride>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub report_errors: Vec<ReportErrorEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branch_parse_failures: Vec<BranchParseFailure>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}
