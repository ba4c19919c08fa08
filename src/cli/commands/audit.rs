//! Audit log CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::Config;
use crate::services::{verify_audit_log, AuditLogReport};

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// Check a JSON lines override log for malformed records
    Verify {
        /// Log to check (defaults to the configured audit path)
        path: Option<PathBuf>,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub path: PathBuf,
    pub valid: bool,
    #[serde(flatten)]
    pub report: AuditLogReport,
}

impl CommandOutput for VerifyOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{}: {} of {} line(s) valid",
            self.path.display(),
            self.report.valid_entries,
            self.report.total_lines
        )];
        if !self.report.issues.is_empty() {
            lines.push(TableFormatter::new().format_audit_issues(&self.report.issues));
        }
        lines.push(if self.valid {
            "Audit log OK".to_string()
        } else {
            "Audit log verification FAILED".to_string()
        });
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AuditArgs, config: &Config, json_mode: bool) -> Result<i32> {
    match args.command {
        AuditCommands::Verify { path, strict } => {
            let path = path.unwrap_or_else(|| config.audit.path.clone());
            let file = File::open(&path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;

            let report = tokio::task::spawn_blocking(move || verify_audit_log(BufReader::new(file)))
                .await
                .context("Audit verification worker failed")?;

            let valid = report.is_valid(strict);
            output(&VerifyOutput { path, valid, report }, json_mode);
            Ok(if valid { 0 } else { 1 })
        }
    }
}
