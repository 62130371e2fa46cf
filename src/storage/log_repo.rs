use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::core::error::StoreError;
use crate::core::record::{normalize_timestamp, LogRecord};
use crate::core::store::{DeletionTarget, LogQuery, LogStore};

/// Rows scanned per round trip while searching.
const SEARCH_PAGE_SIZE: i64 = 500;

type LogRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

pub struct LogRepo {
    pool: SqlitePool,
}

impl LogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn recent(&self, session_limit: usize) -> Result<Vec<LogRecord>, StoreError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, session_id, question, answer, model, created_at FROM logs \
             WHERE session_id IS NULL OR session_id = '' OR session_id IN ( \
                 SELECT session_id FROM logs WHERE session_id <> '' \
                 GROUP BY session_id ORDER BY MAX(created_at) DESC LIMIT ?) \
             ORDER BY created_at DESC",
        )
        .bind(session_limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    /// Pages through the log newest first and keeps matching records.
    ///
    /// SQLite's `LIKE` folds ASCII case only, so the case-insensitive
    /// comparison runs on each record instead.
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<LogRecord>, StoreError> {
        let needle = term.to_lowercase();
        let mut hits = Vec::new();
        let mut offset: i64 = 0;

        loop {
            let rows: Vec<LogRow> = sqlx::query_as(
                "SELECT id, session_id, question, answer, model, created_at FROM logs \
                 ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            )
            .bind(SEARCH_PAGE_SIZE)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

            let page_len = rows.len() as i64;
            hits.extend(
                rows.into_iter()
                    .map(row_to_record)
                    .filter(|record| record.matches(&needle)),
            );
            if hits.len() >= limit || page_len < SEARCH_PAGE_SIZE {
                break;
            }
            offset += SEARCH_PAGE_SIZE;
        }

        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl LogStore for LogRepo {
    async fn fetch(&self, query: &LogQuery) -> Result<Vec<LogRecord>, StoreError> {
        let records = match query {
            LogQuery::Recent { session_limit } => self.recent(*session_limit).await?,
            LogQuery::Search { term, limit } => self.search(term, *limit).await?,
        };
        tracing::debug!(?query, count = records.len(), "fetched log records");
        Ok(records)
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Vec<LogRecord>, StoreError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, session_id, question, answer, model, created_at FROM logs \
             WHERE session_id = ? ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    /// Timestamps are stored normalised so that text order is time order.
    async fn append(&self, record: &LogRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO logs (id, session_id, question, answer, model, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.session_id)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(&record.model)
        .bind(normalize_timestamp(&record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, target: &DeletionTarget) -> Result<u64, StoreError> {
        let result = match target {
            DeletionTarget::All => sqlx::query("DELETE FROM logs").execute(&self.pool).await,
            DeletionTarget::Sessions(ids) if ids.is_empty() => return Ok(0),
            DeletionTarget::Sessions(ids) => {
                // NULL never compares equal, so legacy rows cannot match.
                let mut qb: QueryBuilder<Sqlite> =
                    QueryBuilder::new("DELETE FROM logs WHERE session_id IN (");
                let mut separated = qb.separated(", ");
                for id in ids {
                    separated.push_bind(id.clone());
                }
                separated.push_unseparated(")");
                qb.build().execute(&self.pool).await
            }
        };

        let removed = result
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .rows_affected();
        Ok(removed)
    }
}

/// Missing columns degrade to empty text instead of failing the fetch.
fn row_to_record(row: LogRow) -> LogRecord {
    let (id, session_id, question, answer, model, created_at) = row;
    if question.is_none() || answer.is_none() || model.is_none() || created_at.is_none() {
        tracing::debug!(%id, "log record has missing fields");
    }

    LogRecord {
        id,
        session_id: session_id.filter(|s| !s.is_empty()),
        question: question.unwrap_or_default(),
        answer: answer.unwrap_or_default(),
        model: model.unwrap_or_default(),
        created_at: created_at.unwrap_or_default(),
    }
}
