//! SQLite adapters for the override audit trail.

pub mod audit_repository;
pub mod connection;
pub mod migrations;

pub use audit_repository::SqliteAuditSink;
pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
