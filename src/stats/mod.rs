use crate::error::AppError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Best-effort usage recording. Callers fire-and-forget; a failure here must
/// never abort or delay delivery of an already-obtained file.
#[async_trait]
pub trait StatsRecorder: Send + Sync {
    async fn record(
        &self,
        user_id: &str,
        url: &str,
        content_id: &str,
        quality: &str,
    ) -> Result<(), AppError>;
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct StatRow {
    pub user_id: String,
    pub url: String,
    pub content_id: String,
    pub quality: String,
    pub created_at: String,
}

pub struct SqliteStats {
    pool: SqlitePool,
}

impl SqliteStats {
    pub async fn connect(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS stats (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               user_id TEXT,
               url TEXT,
               video_id TEXT,
               quality TEXT,
               created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
             )",
        )
        .execute(&pool)
        .await?;

        info!("Stats database ready at {}", db_path.display());
        Ok(Self { pool })
    }

    #[allow(dead_code)]
    pub async fn recent(&self, limit: i64) -> Result<Vec<StatRow>, AppError> {
        let rows = sqlx::query(
            "SELECT user_id, url, video_id, quality, created_at
             FROM stats ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StatRow {
                user_id: row.get("user_id"),
                url: row.get("url"),
                content_id: row.get("video_id"),
                quality: row.get("quality"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[async_trait]
impl StatsRecorder for SqliteStats {
    async fn record(
        &self,
        user_id: &str,
        url: &str,
        content_id: &str,
        quality: &str,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO stats (user_id, url, video_id, quality) VALUES (?1, ?2, ?3, ?4)")
            .bind(user_id)
            .bind(url)
            .bind(content_id)
            .bind(quality)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
