use crate::core::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the log store. A missing or blank URL is a configuration error,
    /// not a transport failure.
    pub async fn connect(url: Option<&str>) -> Result<Self, StoreError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(StoreError::Unconfigured)?;

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::debug!(url, "log store connected");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    pub fn logs(&self) -> super::LogRepo {
        super::LogRepo::new(self.pool.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
