//! Outcome of checking a snapshot against thresholds.

use serde::Serialize;
use std::fmt;

use super::threshold::CoverageAxis;

/// Threshold verdict for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every enabled threshold was met.
    Pass,
    /// At least one enabled threshold was missed.
    CoverageFail,
    /// No axis is gated; treated as passing.
    NoThreshold,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::CoverageFail => "coverage_fail",
            Self::NoThreshold => "no_threshold",
        }
    }

    pub fn is_passing(&self) -> bool {
        !matches!(self, Self::CoverageFail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one enabled axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisResult {
    pub axis: CoverageAxis,
    pub actual: f64,
    pub minimum: f64,
    pub met: bool,
}

impl AxisResult {
    /// Inclusive comparison: `actual >= minimum`.
    pub fn check(axis: CoverageAxis, actual: f64, minimum: f64) -> Self {
        Self {
            axis,
            actual,
            minimum,
            met: actual >= minimum,
        }
    }
}

/// Verdict plus the per-axis detail that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub lines: Option<AxisResult>,
    pub branches: Option<AxisResult>,
}

impl Evaluation {
    /// Axes whose threshold was not met.
    pub fn failed_axes(&self) -> Vec<CoverageAxis> {
        [self.lines, self.branches]
            .into_iter()
            .flatten()
            .filter(|result| !result.met)
            .map(|result| result.axis)
            .collect()
    }
}
