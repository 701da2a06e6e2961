//! PostgreSQL persistence for fundctl.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the fund control schema
//! - [`PgStore`], the transactional implementation of the core storage port
//! - [`PgAuditSink`], an append-only audit table writer
//! - Database migrations

pub mod audit;
mod convert;
pub mod entities;
pub mod migration;
pub mod store;

pub use audit::PgAuditSink;
pub use store::PgStore;

use fundctl_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Connects with the pool limits from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
