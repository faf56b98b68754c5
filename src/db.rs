//! SQLite connection pool for the complaint database.
//!
//! WAL journaling lets tracking and stats reads run while a filing writes;
//! concurrent filings queue on the write lock for up to
//! `[db].busy_timeout_ms` instead of failing with "database is locked".

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::time::Duration;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db = &config.db;

    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(db.busy_timeout_ms));

    SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db.path.display()))
}
