//! Table output formatting for CLI commands
//!
//! Coverage results and audit findings rendered with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{AggregateSnapshot, AxisResult, Evaluation, ReportErrorEntry};
use crate::services::{AuditLogIssue, Severity};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Per-axis coverage against its minimum.
    pub fn format_coverage(&self, snapshot: &AggregateSnapshot, evaluation: &Evaluation) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Axis").add_attribute(Attribute::Bold),
            Cell::new("Covered").add_attribute(Attribute::Bold),
            Cell::new("Valid").add_attribute(Attribute::Bold),
            Cell::new("Percent").add_attribute(Attribute::Bold),
            Cell::new("Minimum").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
        ]);

        let rows = [
            (
                "lines",
                snapshot.lines_covered(),
                snapshot.lines_valid(),
                snapshot.line_pct(),
                evaluation.lines,
            ),
            (
                "branches",
                snapshot.branches_covered(),
                snapshot.branches_valid(),
                snapshot.branch_pct(),
                evaluation.branches,
            ),
        ];

        for (axis, covered, valid, pct, result) in rows {
            table.add_row(vec![
                Cell::new(axis),
                Cell::new(covered),
                Cell::new(valid),
                Cell::new(format!("{pct:.2}%")),
                Cell::new(
                    result.map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r.minimum)),
                ),
                self.result_cell(result),
            ]);
        }

        table.to_string()
    }

    fn result_cell(&self, result: Option<AxisResult>) -> Cell {
        let (label, color) = match result {
            None => ("not gated", Color::DarkGrey),
            Some(r) if r.met => ("pass", Color::Green),
            Some(_) => ("FAIL", Color::Red),
        };
        if self.use_colors {
            Cell::new(label).fg(color)
        } else {
            Cell::new(label)
        }
    }

    /// Reports left out of the union.
    pub fn format_report_errors(&self, errors: &[ReportErrorEntry]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Excluded report").add_attribute(Attribute::Bold),
            Cell::new("Error").add_attribute(Attribute::Bold),
        ]);
        for entry in errors {
            table.add_row(vec![
                Cell::new(truncate(entry.report.as_str(), 60)),
                Cell::new(&entry.error),
            ]);
        }
        table.to_string()
    }

    /// Findings of an audit log verification.
    pub fn format_audit_issues(&self, issues: &[AuditLogIssue]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Line").add_attribute(Attribute::Bold),
            Cell::new("Severity").add_attribute(Attribute::Bold),
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Message").add_attribute(Attribute::Bold),
        ]);
        for issue in issues {
            let severity = Cell::new(issue.severity.to_string());
            let severity = if self.use_colors {
                severity.fg(match issue.severity {
                    Severity::Error => Color::Red,
                    Severity::Warning => Color::Yellow,
                })
            } else {
                severity
            };
            table.add_row(vec![
                Cell::new(issue.line),
                severity,
                Cell::new(issue.field),
                Cell::new(truncate(&issue.message, 100)),
            ]);
        }
        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
