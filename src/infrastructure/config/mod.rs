//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides, including legacy CI names
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, LOCAL_CONFIG, PROJECT_CONFIG};
