pub mod config;
pub mod coverage;
pub mod run;
pub mod snapshot;
pub mod threshold;
pub mod verdict;

pub use config::{
    AuditConfig, AuditSinkKind, Config, FlagSetting, GateConfig, GateSettings, LoggingConfig,
    ReportPolicy,
};
pub use coverage::{
    BranchCoverage, BranchParseFailure, CoverageFact, LineKey, ReportId, ReportSource,
};
pub use run::{
    AppliedOverride, OverridePolicy, OverrideRecord, ReportErrorEntry, RunMetadata, RunPhase,
    RunStatus, RunSummary, TestOutcome,
};
pub use snapshot::{percentage, AggregateSnapshot, UNION_METHOD};
pub use threshold::{CoverageAxis, Threshold, ThresholdConfig, ThresholdSetting};
pub use verdict::{AxisResult, Evaluation, Verdict};
