use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::run::{deserialize_lenient_string, OverridePolicy, RunMetadata};
use super::threshold::{ThresholdConfig, ThresholdSetting};
use crate::domain::errors::ConfigError;

/// Main configuration structure for covgate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Thresholds, override switches and report policy
    #[serde(default)]
    pub gate: GateConfig,

    /// Where accepted overrides are recorded
    #[serde(default)]
    pub audit: AuditConfig,

    /// CI run metadata copied into audit records
    #[serde(default)]
    pub run: RunMetadata,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gate configuration as written by the operator. Validated into [`GateSettings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GateConfig {
    /// Minimum line coverage percentage; absent or empty disables the gate
    #[serde(default)]
    pub lines_min: Option<ThresholdSetting>,

    /// Minimum branch coverage percentage; absent or empty disables the gate
    #[serde(default)]
    pub branches_min: Option<ThresholdSetting>,

    /// Whether a failed coverage gate may be overridden at all
    #[serde(default)]
    pub override_allow: Option<FlagSetting>,

    /// Operator-authored justification for an override
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub override_reason: Option<String>,

    /// What to do with a report that fails to parse
    #[serde(default)]
    pub report_policy: ReportPolicy,
}

/// A boolean switch as it may appear in YAML or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagSetting {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl FlagSetting {
    pub fn resolve(&self, field: &'static str) -> Result<bool, ConfigError> {
        let invalid = |value: String| ConfigError::InvalidFlag { field, value };
        match self {
            Self::Bool(value) => Ok(*value),
            Self::Number(0) => Ok(false),
            Self::Number(1) => Ok(true),
            Self::Number(other) => Err(invalid(other.to_string())),
            Self::Text(text) => match text.trim().to_lowercase().as_str() {
                "" | "0" | "false" | "no" | "off" => Ok(false),
                "1" | "true" | "yes" | "on" => Ok(true),
                _ => Err(invalid(text.clone())),
            },
        }
    }
}

/// Caller policy for reports that fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPolicy {
    /// Leave the report out of the union and list the error in the summary
    #[default]
    Exclude,
    /// Abort the run
    Fail,
}

/// Audit sink selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Append-only JSON lines file
    #[default]
    Jsonl,
    /// Insert-only `SQLite` table
    Sqlite,
    /// No sink; only legal while overrides are disallowed
    None,
}

/// Audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    #[serde(default)]
    pub sink: AuditSinkKind,

    /// Path of the JSON lines override log
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,

    /// `SQLite` URL used when `sink` is `sqlite`
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from(".covgate/coverage-override.jsonl")
}

fn default_database_url() -> String {
    "sqlite:.covgate/audit.db".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::default(),
            path: default_audit_path(),
            database_url: default_database_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Validated gate inputs for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateSettings {
    pub thresholds: ThresholdConfig,
    pub overrides: OverridePolicy,
    pub report_policy: ReportPolicy,
    pub metadata: RunMetadata,
}

impl TryFrom<&Config> for GateSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let gate = &config.gate;
        let thresholds =
            ThresholdConfig::from_settings(gate.lines_min.as_ref(), gate.branches_min.as_ref())?;
        let allow = gate
            .override_allow
            .as_ref()
            .map(|flag| flag.resolve("override_allow"))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            thresholds,
            overrides: OverridePolicy::new(allow, gate.override_reason.as_deref()),
            report_policy: gate.report_policy,
            metadata: config.run.clone(),
        })
    }
}
