//! Persistence layer for local flow history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteHistory;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of flow a history record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Provision,
    Pipeline,
    Deploy,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Provision => "provision",
            FlowKind::Pipeline => "pipeline",
            FlowKind::Deploy => "deploy",
        }
    }
}

/// One locally recorded flow invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique local id
    pub id: Uuid,

    /// Which flow ran
    pub kind: FlowKind,

    /// Target resource name (feature group, pipeline, or model)
    pub target: String,

    /// Remote identifier, when the platform handed one back
    pub remote_id: Option<String>,

    /// Final status, e.g. "succeeded" or an error summary
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Open a record for a flow that just started
    pub fn started(kind: FlowKind, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target: target.into(),
            remote_id: None,
            status: "running".to_string(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Close the record with a final status
    pub fn finish(&mut self, status: impl Into<String>, remote_id: Option<String>) {
        self.status = status.into();
        self.remote_id = remote_id;
        self.completed_at = Some(Utc::now());
    }
}

/// Trait for history backends
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Save (or overwrite) a record
    async fn save(&self, record: &RunRecord) -> Result<()>;

    /// Load a record by id
    async fn load(&self, id: Uuid) -> Result<Option<RunRecord>>;

    /// Most recent records, newest first
    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>>;
}

/// In-memory history (for testing or ephemeral use)
pub struct InMemoryHistory {
    records: tokio::sync::RwLock<Vec<RunRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn save(&self, record: &RunRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<RunRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let records = self.records.read().await;
        let mut sorted: Vec<_> = records.clone();
        sorted.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sorted.truncate(limit);
        Ok(sorted)
    }
}
