//! Platform API error and response payload types

use crate::core::state::{EndpointStatus, QueryStatus, ResourceStatus, RunStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for platform API operations
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Feature group state as reported by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureGroupDescription {
    pub name: String,
    pub status: ResourceStatus,

    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Offline table name, present once the offline side is queryable
    #[serde(default)]
    pub offline_table: Option<String>,
}

/// Offline query state as reported by the managed query engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDescription {
    pub query_id: String,
    pub status: QueryStatus,

    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Result object location, present once the query succeeded
    #[serde(default)]
    pub result_location: Option<String>,
}

/// Pipeline run state as reported by the execution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDescription {
    pub run_id: String,
    pub status: RunStatus,

    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Id of the step that failed, when the run failed
    #[serde(default)]
    pub failed_step: Option<String>,
}

/// Endpoint state as reported by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDescription {
    pub name: String,
    pub status: EndpointStatus,

    #[serde(default)]
    pub failure_reason: Option<String>,
}
