//! Aggregated coverage totals.

use serde::Serialize;

/// Name of the merge method recorded in every snapshot.
pub const UNION_METHOD: &str = "union_by_file_line";

/// Coverage totals derived from the union of all ingested facts.
///
/// Built once per aggregation run and immutable afterwards; the percentages
/// are always derived from the counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    lines_covered: u64,
    lines_valid: u64,
    branches_covered: u64,
    branches_valid: u64,
    line_pct: f64,
    branch_pct: f64,
    method: &'static str,
}

impl AggregateSnapshot {
    pub fn from_counts(
        lines_covered: u64,
        lines_valid: u64,
        branches_covered: u64,
        branches_valid: u64,
    ) -> Self {
        Self {
            lines_covered,
            lines_valid,
            branches_covered,
            branches_valid,
            line_pct: percentage(lines_covered, lines_valid),
            branch_pct: percentage(branches_covered, branches_valid),
            method: UNION_METHOD,
        }
    }

    /// Snapshot of zero reports.
    pub fn empty() -> Self {
        Self::from_counts(0, 0, 0, 0)
    }

    pub fn lines_covered(&self) -> u64 {
        self.lines_covered
    }

    pub fn lines_valid(&self) -> u64 {
        self.lines_valid
    }

    pub fn branches_covered(&self) -> u64 {
        self.branches_covered
    }

    pub fn branches_valid(&self) -> u64 {
        self.branches_valid
    }

    pub fn line_pct(&self) -> f64 {
        self.line_pct
    }

    pub fn branch_pct(&self) -> f64 {
        self.branch_pct
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

/// `covered / valid * 100`, rounded half away from zero to two decimals.
///
/// Rounding is done on integer hundredths of a percent, so identical counts
/// always produce bit-identical output. Returns `0.0` when `valid == 0`.
#[allow(clippy::cast_precision_loss)]
pub fn percentage(covered: u64, valid: u64) -> f64 {
    if valid == 0 {
        return 0.0;
    }
    let covered = u128::from(covered);
    let valid = u128::from(valid);
    let hundredths = (covered * 20_000 + valid) / (2 * valid);
    hundredths as f64 / 100.0
}
