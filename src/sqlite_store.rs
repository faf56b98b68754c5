//! SQLite-backed [`ComplaintStore`] implementation.
//!
//! One row per complaint in the `complaints` table. Answer maps and
//! attachments are stored as JSON text; timestamps as RFC 3339 text so
//! they read back exactly as written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cyberguard_core::catalog::Language;
use cyberguard_core::models::{
    AnswerRecord, Attachment, Category, ComplaintRecord, ComplaintStatus, TicketId,
};
use cyberguard_core::store::{ComplaintStats, ComplaintStore, StoreError};

/// SQLite implementation of the [`ComplaintStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| backend(format!("bad timestamp '{}': {}", raw, e)))
}

fn row_to_record(row: &SqliteRow) -> Result<ComplaintRecord, StoreError> {
    let ticket: String = row.get("ticket_id");
    let language: String = row.get("language");
    let category: String = row.get("category");
    let status: String = row.get("status");
    let answers: String = row.get("answers_json");
    let answers_native: String = row.get("answers_native_json");
    let attachments: String = row.get("attachments_json");
    let filed_at: String = row.get("filed_at");
    let last_updated: String = row.get("last_updated");

    Ok(ComplaintRecord {
        ticket_id: TicketId::from_user_input(&ticket),
        language: language.parse::<Language>().map_err(backend)?,
        answers_native: serde_json::from_str::<AnswerRecord>(&answers_native).map_err(backend)?,
        answers: serde_json::from_str::<AnswerRecord>(&answers).map_err(backend)?,
        category: category.parse::<Category>().map_err(backend)?,
        explanation: row.get("explanation"),
        attachments: serde_json::from_str::<Vec<Attachment>>(&attachments).map_err(backend)?,
        status: status.parse::<ComplaintStatus>().map_err(backend)?,
        filed_at: parse_ts(&filed_at)?,
        last_updated: parse_ts(&last_updated)?,
    })
}

#[async_trait]
impl ComplaintStore for SqliteStore {
    async fn insert(&self, record: &ComplaintRecord) -> Result<TicketId, StoreError> {
        let answers = serde_json::to_string(&record.answers).map_err(backend)?;
        let answers_native = serde_json::to_string(&record.answers_native).map_err(backend)?;
        let attachments = serde_json::to_string(&record.attachments).map_err(backend)?;

        let result = sqlx::query(
            r#"
            INSERT INTO complaints (ticket_id, language, category, explanation, status,
                                    answers_json, answers_native_json, attachments_json,
                                    filed_at, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.ticket_id.as_str())
        .bind(record.language.name())
        .bind(record.category.as_str())
        .bind(&record.explanation)
        .bind(record.status.as_str())
        .bind(answers)
        .bind(answers_native)
        .bind(attachments)
        .bind(record.filed_at.to_rfc3339())
        .bind(record.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record.ticket_id.clone()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(record.ticket_id.clone()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn fetch(&self, ticket: &TicketId) -> Result<Option<ComplaintRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM complaints WHERE ticket_id = ?")
            .bind(ticket.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn update_status(
        &self,
        ticket: &TicketId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE complaints SET status = ?, last_updated = ? WHERE ticket_id = ?")
                .bind(status.as_str())
                .bind(at.to_rfc3339())
                .bind(ticket.as_str())
                .execute(&self.pool)
                .await
                .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(ticket.clone()));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<ComplaintStats, StoreError> {
        let (total, resolved, active): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'Resolved' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'Under Investigation' THEN 1 ELSE 0 END), 0)
            FROM complaints
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(ComplaintStats {
            total: total as u64,
            resolved: resolved as u64,
            active: active as u64,
        })
    }
}
