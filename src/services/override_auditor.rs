//! Final status resolution and override auditing.
//!
//! Combines the coverage verdict with the external test result. An override
//! is accepted only when tests passed, overrides are allowed and a non-empty
//! reason was given; the audit record is appended before the run is allowed
//! to finish as `coverage_overridden`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::{GateError, GateResult};
use crate::domain::models::{
    AggregateSnapshot, Evaluation, OverridePolicy, OverrideRecord, RunMetadata, RunPhase,
    RunStatus, TestOutcome, ThresholdConfig,
};
use crate::domain::ports::AuditSink;

/// Single-use state machine for one run.
#[derive(Debug)]
pub struct RunStateMachine {
    phase: RunPhase,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Pending,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn transition(&mut self, next: RunPhase) -> GateResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(GateError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> GateResult<RunStatus> {
        self.transition(RunPhase::Finished(status))?;
        Ok(status)
    }
}

/// Outcome of the auditor for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: RunStatus,
    /// The appended record, present only for `coverage_overridden`.
    pub record: Option<OverrideRecord>,
}

pub struct OverrideAuditor {
    sink: Arc<dyn AuditSink>,
    policy: OverridePolicy,
    metadata: RunMetadata,
}

impl OverrideAuditor {
    pub fn new(sink: Arc<dyn AuditSink>, policy: OverridePolicy, metadata: RunMetadata) -> Self {
        Self {
            sink,
            policy,
            metadata,
        }
    }

    /// Resolve the final status. Fails if an accepted override could not be audited.
    pub async fn decide(
        &self,
        evaluation: &Evaluation,
        snapshot: &AggregateSnapshot,
        thresholds: &ThresholdConfig,
        tests: TestOutcome,
    ) -> GateResult<Decision> {
        let mut machine = RunStateMachine::new();
        machine.transition(RunPhase::EvaluatingCoverage)?;

        if !tests.succeeded() {
            if self.policy.reason().is_some() {
                info!(
                    exit_code = tests.exit_code,
                    "Override ignored because tests failed"
                );
            }
            let status = machine.finish(RunStatus::TestsFailed)?;
            return Ok(Decision {
                status,
                record: None,
            });
        }

        if evaluation.verdict.is_passing() {
            let status = machine.finish(RunStatus::Ok)?;
            return Ok(Decision {
                status,
                record: None,
            });
        }

        machine.transition(RunPhase::AwaitingOverrideDecision)?;

        let reason = match (self.policy.allow, self.policy.reason()) {
            (true, Some(reason)) => reason,
            (true, None) => {
                warn!("Coverage override requested without a reason; override rejected");
                return Ok(Decision {
                    status: machine.finish(RunStatus::CoverageFailed)?,
                    record: None,
                });
            }
            (false, reason) => {
                if reason.is_some() {
                    info!("Override reason supplied but overrides are not allowed");
                }
                return Ok(Decision {
                    status: machine.finish(RunStatus::CoverageFailed)?,
                    record: None,
                });
            }
        };

        let record = OverrideRecord::new(reason, snapshot, thresholds, &self.metadata);
        self.sink.append(&record).await?;

        warn!(
            line_pct = record.line_pct,
            branch_pct = record.branch_pct,
            reason = %record.override_reason,
            "Coverage gate overridden"
        );

        Ok(Decision {
            status: machine.finish(RunStatus::CoverageOverridden)?,
            record: Some(record),
        })
    }
}
