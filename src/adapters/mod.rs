//! Infrastructure adapters for external systems.

pub mod audit;
pub mod sqlite;
