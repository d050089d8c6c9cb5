//! SQLite-backed flow history

use crate::persistence::{FlowKind, HistoryBackend, RunRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// SQLite history store
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) a history database
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .context("Failed to connect to history database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Open the history database at the default user data path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("mlpipe");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("history.db");
        Self::new(&db_path.to_string_lossy()).await
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flow_runs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                target TEXT NOT NULL,
                remote_id TEXT,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_flow_runs_started_at ON flow_runs(started_at);
            CREATE INDEX IF NOT EXISTS idx_flow_runs_kind ON flow_runs(kind);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn parse_kind(kind: &str) -> FlowKind {
        match kind {
            "provision" => FlowKind::Provision,
            "deploy" => FlowKind::Deploy,
            _ => FlowKind::Pipeline,
        }
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RunRecord> {
        Ok(RunRecord {
            id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            kind: Self::parse_kind(&row.get::<String, _>("kind")),
            target: row.get("target"),
            remote_id: row.get("remote_id"),
            status: row.get("status"),
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: row
                .get::<Option<NaiveDateTime>, _>("completed_at")
                .map(Self::from_naive),
        })
    }
}

#[async_trait::async_trait]
impl HistoryBackend for SqliteHistory {
    async fn save(&self, record: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO flow_runs
            (id, kind, target, remote_id, status, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.kind.as_str())
        .bind(&record.target)
        .bind(&record.remote_id)
        .bind(&record.status)
        .bind(Self::to_naive(record.started_at))
        .bind(record.completed_at.map(Self::to_naive))
        .execute(&self.pool)
        .await
        .context("Failed to save flow record")?;

        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<RunRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, target, remote_id, status, started_at, completed_at
            FROM flow_runs
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load flow record")?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, target, remote_id, status, started_at, completed_at
            FROM flow_runs
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list flow records")?;

        rows.iter().map(Self::record_from_row).collect()
    }
}
