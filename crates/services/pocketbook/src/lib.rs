//! PocketBook library
//!
//! User records behind a repository and unit-of-work layer on SeaORM.
//! The binary in `main.rs` is a thin command-line front end over [`commands`].

pub mod commands;
pub mod config;
pub mod infra;
pub mod repository;

use common::AppResult;

use crate::config::PocketBookConfig;
use crate::infra::Database;

/// Connect to the configured database, creating the schema when missing.
pub async fn open(config: &PocketBookConfig) -> AppResult<Database> {
    let database = Database::connect(&config.database).await?;
    tracing::debug!(service = %config.service.service_name, "Database ready");
    Ok(database)
}
