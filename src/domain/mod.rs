//! Domain layer for the coverage gate
//!
//! This module contains the coverage data model, the error taxonomy and the
//! port traits implemented by infrastructure adapters.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{
    AuditWriteError, ConfigError, GateError, GateResult, ReportParseError, ReportParseErrorKind,
};
