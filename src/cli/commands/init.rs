//! Implementation of the `covgate init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::PROJECT_CONFIG;

/// Starting configuration; the thresholds match the usual CI defaults.
const DEFAULT_CONFIG: &str = r#"# covgate configuration
#
# Environment variables override this file: COVGATE_GATE__LINES_MIN=80,
# or the CI names COVERAGE_LINES_MIN, COVERAGE_BRANCHES_MIN,
# COVERAGE_OVERRIDE_ALLOW and COVERAGE_OVERRIDE_REASON.

gate:
  # Minimum percentages; an empty value disables that axis.
  lines_min: 90
  branches_min: 85
  override_allow: false
  # exclude: leave unreadable reports out of the union; fail: abort the run
  report_policy: exclude

audit:
  # jsonl, sqlite or none (none forbids overrides)
  sink: jsonl
  path: .covgate/coverage-override.jsonl
  database_url: sqlite:.covgate/audit.db

logging:
  level: info
  format: pretty
  rotation: daily
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!("{}\n  {}", self.message, self.config_path.display())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<i32> {
    let config_path = args.path.join(PROJECT_CONFIG);

    if config_path.exists() && !args.force {
        output(
            &InitOutput {
                success: false,
                message: "Configuration already exists. Use --force to overwrite it.".to_string(),
                config_path,
            },
            json_mode,
        );
        return Ok(1);
    }

    // Only the config file is replaced; an existing audit log is never touched.
    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&config_path, DEFAULT_CONFIG)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    output(
        &InitOutput {
            success: true,
            message: if args.force {
                "Configuration rewritten.".to_string()
            } else {
                "Configuration created.".to_string()
            },
            config_path,
        },
        json_mode,
    );
    Ok(0)
}
