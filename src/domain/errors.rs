//! Domain errors for the coverage gate.

use std::path::PathBuf;
use thiserror::Error;

use super::models::coverage::ReportId;
use super::models::run::RunPhase;

/// A coverage report could not be read as a well-formed Cobertura document.
///
/// Always carries the identity of the offending report so the caller can
/// exclude it and continue, or abort the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("report {report}: {kind}")]
pub struct ReportParseError {
    pub report: ReportId,
    pub kind: ReportParseErrorKind,
}

impl ReportParseError {
    pub fn new(report: ReportId, kind: ReportParseErrorKind) -> Self {
        Self { report, kind }
    }
}

/// What exactly was wrong with a report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReportParseErrorKind {
    #[error("failed to read report: {0}")]
    Io(String),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("unexpected root element <{0}>, expected <coverage>")]
    UnexpectedRoot(String),

    #[error("document is empty")]
    Empty,

    #[error("document ended before </coverage>")]
    Truncated,

    #[error("element <{0}> found after </coverage>")]
    TrailingContent(String),

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("<line> found outside of a <class>")]
    OrphanLine,
}

/// Threshold, override or ambient configuration is malformed.
///
/// Always fatal, and always raised before any report is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {axis} threshold '{value}'. Must be a number between 0 and 100")]
    InvalidThreshold { axis: &'static str, value: String },

    #[error("Invalid value for {field}: '{value}'. Expected true/false, yes/no, on/off or 1/0")]
    InvalidFlag { field: &'static str, value: String },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Audit log path cannot be empty")]
    EmptyAuditPath,

    #[error("Audit database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Coverage overrides are allowed but the audit sink is disabled")]
    UnauditedOverride,

    #[error("Failed to extract configuration: {0}")]
    Extraction(String),
}

/// The override audit log could not be appended.
#[derive(Debug, Error)]
pub enum AuditWriteError {
    #[error("Failed to append to audit log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize override record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit database error: {0}")]
    Database(String),

    #[error("Audit sink is disabled; an override cannot be recorded")]
    Disabled,

    #[error("Audit writer failed: {0}")]
    Worker(String),

    #[error("Audit sink rejected the record: {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for AuditWriteError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

fn format_report_errors(errors: &[ReportParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that abort a gate run.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} report(s) failed to parse: {}", .0.len(), format_report_errors(.0))]
    Report(Vec<ReportParseError>),

    #[error(transparent)]
    Audit(#[from] AuditWriteError),

    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("Report ingestion worker failed: {0}")]
    Worker(String),
}

pub type GateResult<T> = Result<T, GateError>;
