use crate::domain::models::{
    AggregateSnapshot, AxisResult, CoverageAxis, Evaluation, ThresholdConfig, Verdict,
};

/// Checks an aggregate snapshot against per-axis minimums.
///
/// Disabled axes never contribute to failure. Comparison is inclusive, so
/// a percentage exactly equal to its minimum passes.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdEvaluator {
    thresholds: ThresholdConfig,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn evaluate(&self, snapshot: &AggregateSnapshot) -> Evaluation {
        let check = |axis: CoverageAxis, actual: f64| {
            self.thresholds
                .for_axis(axis)
                .minimum()
                .map(|minimum| AxisResult::check(axis, actual, minimum))
        };

        let lines = check(CoverageAxis::Lines, snapshot.line_pct());
        let branches = check(CoverageAxis::Branches, snapshot.branch_pct());

        let verdict = match (lines, branches) {
            (None, None) => Verdict::NoThreshold,
            _ if [lines, branches].into_iter().flatten().all(|r| r.met) => Verdict::Pass,
            _ => Verdict::CoverageFail,
        };

        Evaluation {
            verdict,
            lines,
            branches,
        }
    }
}
