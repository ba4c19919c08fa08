//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces that infrastructure adapters
//! must implement:
//! - AuditSink: append-only storage for coverage override records
//!
//! These traits keep the gate logic independent of where audit records live.

pub mod audit_sink;

pub use audit_sink::AuditSink;
