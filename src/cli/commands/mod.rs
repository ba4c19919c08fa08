//! CLI command implementations.
//!
//! Each command returns the process exit code on success.

pub mod audit;
pub mod check;
pub mod init;
pub mod snapshot;
