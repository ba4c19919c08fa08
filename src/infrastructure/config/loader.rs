use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;

pub use crate::domain::errors::ConfigError;
use crate::domain::models::config::{AuditSinkKind, Config, GateSettings};

/// Project configuration written by `covgate init`.
pub const PROJECT_CONFIG: &str = ".covgate/config.yaml";
/// Optional untracked overrides next to the project configuration.
pub const LOCAL_CONFIG: &str = ".covgate/local.yaml";

/// Environment names understood by existing CI pipelines, mapped onto config keys.
const LEGACY_ENV: [(&str, &str); 6] = [
    ("COVERAGE_LINES_MIN", "gate.lines_min"),
    ("COVERAGE_BRANCHES_MIN", "gate.branches_min"),
    ("COVERAGE_OVERRIDE_ALLOW", "gate.override_allow"),
    ("COVERAGE_OVERRIDE_REASON", "gate.override_reason"),
    ("GITHUB_RUN_ID", "run.run_id"),
    ("GITHUB_REF", "run.git_ref"),
];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Build the provider chain without extracting it.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `config_file`, or .covgate/config.yaml then .covgate/local.yaml
    /// 3. Environment variables (COVGATE_* prefix, `__` separates sections)
    /// 4. Legacy CI variables (COVERAGE_*, GITHUB_RUN_ID, GITHUB_REF)
    ///
    /// Callers may merge further providers (command-line flags) on top.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        figment = match config_file {
            Some(path) => figment.merge(Yaml::file(path)),
            None => figment
                .merge(Yaml::file(PROJECT_CONFIG))
                .merge(Yaml::file(LOCAL_CONFIG)),
        };

        figment = figment.merge(Env::prefixed("COVGATE_").split("__"));

        // Read as plain strings; numeric parsing happens during validation.
        for (var, key) in LEGACY_ENV {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        figment
    }

    /// Extract and validate a configuration from a prepared figment.
    pub fn extract(figment: &Figment) -> Result<Config, ConfigError> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Extraction(e.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from the project directory and environment
    pub fn load() -> Result<Config> {
        Self::extract(&Self::figment(None)).context("Failed to load configuration")
    }

    /// Load configuration from a specific file (environment still applies)
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        Self::extract(&Self::figment(Some(path)))
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let settings = GateSettings::try_from(config)?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        match config.audit.sink {
            AuditSinkKind::Jsonl if config.audit.path.as_os_str().is_empty() => {
                return Err(ConfigError::EmptyAuditPath);
            }
            AuditSinkKind::Sqlite if config.audit.database_url.trim().is_empty() => {
                return Err(ConfigError::EmptyDatabaseUrl);
            }
            AuditSinkKind::None if settings.overrides.allow => {
                return Err(ConfigError::UnauditedOverride);
            }
            _ => {}
        }

        Ok(())
    }
}
