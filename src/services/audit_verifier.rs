//! Integrity check for the JSON lines override log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::BufRead;

use crate::domain::models::RunStatus;

const REQUIRED_FIELDS: [&str; 5] = ["ts", "status", "line_pct", "branch_pct", "override_reason"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::Warning => f.write_str("WARN"),
        }
    }
}

/// One finding. `line` is 1-based; 0 refers to the file as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditLogIssue {
    pub line: usize,
    pub field: &'static str,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditLogReport {
    pub total_lines: usize,
    pub valid_entries: usize,
    pub issues: Vec<AuditLogIssue>,
}

impl AuditLogReport {
    pub fn errors(&self) -> impl Iterator<Item = &AuditLogIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &AuditLogIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// In strict mode warnings fail the check too.
    pub fn is_valid(&self, strict: bool) -> bool {
        if strict {
            self.issues.is_empty()
        } else {
            self.errors().next().is_none()
        }
    }

    fn error(&mut self, line: usize, field: &'static str, message: impl Into<String>) {
        self.push(line, field, message.into(), Severity::Error);
    }

    fn warning(&mut self, line: usize, field: &'static str, message: impl Into<String>) {
        self.push(line, field, message.into(), Severity::Warning);
    }

    fn push(&mut self, line: usize, field: &'static str, message: String, severity: Severity) {
        self.issues.push(AuditLogIssue {
            line,
            field,
            message,
            severity,
        });
    }
}

/// Check every line of an override log.
pub fn verify_audit_log<R: BufRead>(reader: R) -> AuditLogReport {
    let now = Utc::now();
    let mut report = AuditLogReport::default();

    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                report.error(number, "file", format!("Failed to read line: {err}"));
                break;
            }
        };
        report.total_lines = number;

        let line = line.trim();
        if line.is_empty() {
            report.warning(number, "format", "Blank line");
            continue;
        }

        if verify_entry(&mut report, number, line, now) {
            report.valid_entries += 1;
        }
    }

    if report.total_lines == 0 {
        report.error(0, "file", "Audit log is empty");
    }

    report
}

fn verify_entry(report: &mut AuditLogReport, line: usize, text: &str, now: DateTime<Utc>) -> bool {
    let entry = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(entry)) => entry,
        Ok(other) => {
            report.error(line, "format", format!("Expected JSON object, got {}", kind(&other)));
            return false;
        }
        Err(err) => {
            report.error(line, "format", format!("Invalid JSON: {err}"));
            return false;
        }
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !entry.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        report.error(
            line,
            "fields",
            format!("Missing required fields: {}", missing.join(", ")),
        );
        return false;
    }

    let checks = [
        verify_timestamp(report, line, &entry, now),
        verify_status(report, line, &entry),
        verify_reason(report, line, &entry),
        verify_percentage(report, line, &entry, "line_pct", false),
        verify_percentage(report, line, &entry, "branch_pct", false),
        verify_percentage(report, line, &entry, "lines_min", true),
        verify_percentage(report, line, &entry, "branches_min", true),
    ];
    checks.iter().all(|ok| *ok)
}

fn verify_timestamp(
    report: &mut AuditLogReport,
    line: usize,
    entry: &Map<String, Value>,
    now: DateTime<Utc>,
) -> bool {
    let Some(ts) = entry.get("ts").and_then(Value::as_str) else {
        report.error(line, "ts", "Expected an ISO-8601 string");
        return false;
    };
    let parsed = match DateTime::parse_from_rfc3339(ts) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.error(line, "ts", format!("Invalid ISO-8601 timestamp '{ts}': {err}"));
            return false;
        }
    };
    if parsed.offset().local_minus_utc() != 0 {
        report.error(line, "ts", format!("Timestamp is not UTC: {ts}"));
        return false;
    }
    if parsed.with_timezone(&Utc) > now {
        report.warning(line, "ts", format!("Future timestamp detected: {ts}"));
    }
    true
}

fn verify_status(report: &mut AuditLogReport, line: usize, entry: &Map<String, Value>) -> bool {
    let status = entry.get("status").and_then(Value::as_str);
    if status.and_then(RunStatus::from_str) == Some(RunStatus::CoverageOverridden) {
        return true;
    }
    report.error(
        line,
        "status",
        format!(
            "Expected \"{}\", got {}",
            RunStatus::CoverageOverridden,
            entry.get("status").unwrap_or(&Value::Null)
        ),
    );
    false
}

fn verify_reason(report: &mut AuditLogReport, line: usize, entry: &Map<String, Value>) -> bool {
    match entry.get("override_reason").and_then(Value::as_str) {
        Some(reason) if !reason.trim().is_empty() => true,
        Some(_) => {
            report.error(line, "override_reason", "Override reason is empty");
            false
        }
        None => {
            report.error(line, "override_reason", "Expected a string");
            false
        }
    }
}

fn verify_percentage(
    report: &mut AuditLogReport,
    line: usize,
    entry: &Map<String, Value>,
    field: &'static str,
    nullable: bool,
) -> bool {
    match entry.get(field) {
        None | Some(Value::Null) if nullable => true,
        Some(value) => match value.as_f64() {
            Some(pct) if (0.0..=100.0).contains(&pct) => true,
            Some(pct) => {
                report.error(line, field, format!("Percentage out of range: {pct}"));
                false
            }
            None => {
                report.error(line, field, format!("Expected a number, got {}", kind(value)));
                false
            }
        },
        None => {
            report.error(line, field, "Missing");
            false
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
