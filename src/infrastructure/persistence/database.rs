use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool holding the historical grid series.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // `epoch` orders and deduplicates; `timestamp` keeps the original
        // offset and `local_month` is the calendar month at that offset.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grid_series (
                series TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                local_month INTEGER NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (series, epoch)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create grid_series table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_grid_series_month
            ON grid_series (series, local_month, epoch);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create grid_series month index")?;

        Ok(())
    }
}
