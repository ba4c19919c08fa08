//! covgate - union coverage aggregation and audited quality gate
//!
//! Merges Cobertura reports from several test projects into one coverage
//! snapshot without double counting shared lines, checks it against
//! per-axis thresholds and resolves the final CI status. A failed gate can
//! be overridden only with a reason, and every accepted override is
//! appended to an audit log before the run reports success.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the audit sink port
//! - **Service Layer** (`services`): ingestion, aggregation, evaluation and auditing
//! - **Adapters** (`adapters`): JSON lines and `SQLite` audit sinks
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use covgate::adapters::audit::JsonlAuditSink;
//! use covgate::domain::models::{GateSettings, ReportSource, TestOutcome};
//! use covgate::services::{GateRequest, GateService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = Arc::new(JsonlAuditSink::new("logs/ci/coverage-override.jsonl"));
//!     let service = GateService::new(GateSettings::default(), sink);
//!     let summary = service
//!         .run(GateRequest {
//!             reports: vec![ReportSource::path("tests/coverage.cobertura.xml")],
//!             tests: TestOutcome::passed(),
//!         })
//!         .await?;
//!     println!("{}", summary.status);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AggregateSnapshot, Config, CoverageFact, GateSettings, OverrideRecord, ReportSource,
    RunStatus, RunSummary, TestOutcome, ThresholdConfig, Verdict,
};
pub use domain::ports::AuditSink;
pub use domain::{AuditWriteError, ConfigError, GateError, ReportParseError};
pub use infrastructure::config::ConfigLoader;
pub use services::{CoverageAccumulator, GateRequest, GateService};
