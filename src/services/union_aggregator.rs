//! Union aggregation of coverage facts across reports.
//!
//! Lines are merged by logical OR of `hit` per `(file_path, line_number)`.
//! Branch counts are merged by taking the maximum `covered` and the maximum
//! `valid` independently, so two reports instrumenting the same line are
//! never double counted. Totals are recomputed from the merged keys.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::models::{
    AggregateSnapshot, BranchCoverage, BranchParseFailure, CoverageFact, LineKey,
};

/// Running union of coverage facts.
///
/// The merge is commutative, associative and idempotent, so accumulators
/// built from disjoint sets of reports can be combined in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageAccumulator {
    line_hits: BTreeMap<LineKey, bool>,
    branch_counts: BTreeMap<LineKey, (u32, u32)>,
    failures: BTreeSet<BranchParseFailure>,
}

impl CoverageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fact into the union.
    pub fn absorb(&mut self, fact: CoverageFact) {
        let key = LineKey::new(fact.file_path, fact.line_number);

        match fact.branch {
            Some(BranchCoverage::Parsed { covered, valid }) => {
                self.merge_branch(key.clone(), (covered, valid));
            }
            Some(BranchCoverage::Unparseable { raw }) => {
                self.failures.insert(BranchParseFailure {
                    file_path: key.file_path.clone(),
                    line_number: key.line_number,
                    raw,
                });
            }
            None => {}
        }

        self.merge_line(key, fact.hit);
    }

    pub fn absorb_all(&mut self, facts: impl IntoIterator<Item = CoverageFact>) {
        for fact in facts {
            self.absorb(fact);
        }
    }

    /// Union another accumulator into this one.
    pub fn merge(&mut self, other: Self) {
        for (key, hit) in other.line_hits {
            self.merge_line(key, hit);
        }
        for (key, counts) in other.branch_counts {
            self.merge_branch(key, counts);
        }
        self.failures.extend(other.failures);
    }

    fn merge_line(&mut self, key: LineKey, hit: bool) {
        let entry = self.line_hits.entry(key).or_insert(false);
        *entry |= hit;
    }

    fn merge_branch(&mut self, key: LineKey, (covered, valid): (u32, u32)) {
        self.branch_counts
            .entry(key)
            .and_modify(|(best_covered, best_valid)| {
                *best_covered = (*best_covered).max(covered);
                *best_valid = (*best_valid).max(valid);
            })
            .or_insert((covered, valid));
    }

    /// Number of distinct line keys seen so far.
    pub fn line_count(&self) -> usize {
        self.line_hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_hits.is_empty()
    }

    /// Compute totals and percentages from the current union.
    pub fn snapshot(&self) -> AggregateSnapshot {
        let lines_valid = self.line_hits.len() as u64;
        let lines_covered = self.line_hits.values().filter(|hit| **hit).count() as u64;

        let (branches_covered, branches_valid) = self
            .branch_counts
            .values()
            .fold((0u64, 0u64), |(covered, valid), (c, v)| {
                (covered + u64::from(*c), valid + u64::from(*v))
            });

        AggregateSnapshot::from_counts(lines_covered, lines_valid, branches_covered, branches_valid)
    }

    /// Branch lines whose condition coverage could not be read, sorted by location.
    pub fn branch_parse_failures(&self) -> Vec<BranchParseFailure> {
        self.failures.iter().cloned().collect()
    }
}
