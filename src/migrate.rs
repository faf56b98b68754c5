use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Filed complaints. Answer maps and attachments are JSON documents.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS complaints (
            ticket_id TEXT PRIMARY KEY,
            language TEXT NOT NULL,
            category TEXT NOT NULL,
            explanation TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Under Investigation',
            answers_json TEXT NOT NULL DEFAULT '{}',
            answers_native_json TEXT NOT NULL DEFAULT '{}',
            attachments_json TEXT NOT NULL DEFAULT '[]',
            filed_at TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_complaints_status ON complaints(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_complaints_filed_at ON complaints(filed_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
