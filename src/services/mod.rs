pub mod audit_verifier;
pub mod gate_service;
pub mod override_auditor;
pub mod report_ingestor;
pub mod threshold_evaluator;
pub mod union_aggregator;

pub use audit_verifier::{verify_audit_log, AuditLogIssue, AuditLogReport, Severity};
pub use gate_service::{aggregate, Aggregation, GateRequest, GateService};
pub use override_auditor::{Decision, OverrideAuditor, RunStateMachine};
pub use report_ingestor::{CoberturaFacts, ReportIngestor};
pub use threshold_evaluator::ThresholdEvaluator;
pub use union_aggregator::CoverageAccumulator;
