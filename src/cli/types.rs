//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use figment::Figment;
use std::path::PathBuf;

use super::commands::audit::AuditArgs;
use super::commands::check::CheckArgs;
use super::commands::init::InitArgs;
use super::commands::snapshot::SnapshotArgs;

#[derive(Parser, Debug)]
#[command(name = "covgate")]
#[command(about = "Union coverage aggregation and audited quality gate", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file to use instead of .covgate/config.yaml
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Aggregate reports, evaluate thresholds and resolve the run status
    Check(CheckArgs),

    /// Aggregate reports and print the union snapshot
    Snapshot(SnapshotArgs),

    /// Audit log commands
    Audit(AuditArgs),

    /// Write a starting configuration file
    Init(InitArgs),
}

impl Commands {
    /// Merge command-line settings on top of the configuration chain.
    pub fn configure(&self, figment: Figment) -> Figment {
        match self {
            Self::Check(args) => args.apply(figment),
            _ => figment,
        }
    }
}
