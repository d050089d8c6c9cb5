//! Remote platform API clients
//!
//! Every non-trivial operation is delegated to the managed platform; these
//! traits are the whole boundary. Flows are generic over them so tests can
//! substitute a scripted implementation.

pub mod http;
pub mod response;

use crate::core::artifact::ResourceRequirements;
use crate::core::pipeline::PipelineDefinition;
use crate::core::record::{FeatureGroupConfig, Record};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::HashMap;

pub use http::HttpPlatformClient;
pub use response::{
    ApiError, EndpointDescription, FeatureGroupDescription, QueryDescription, RunDescription,
};

/// Configuration for the platform client
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the platform control plane
    pub endpoint: String,

    /// Bearer token, if the deployment requires one
    pub token: Option<String>,

    /// Timeout for individual requests in seconds
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            token: None,
            timeout_secs: 60,
        }
    }
}

impl PlatformConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Build a config from `MLPIPE_ENDPOINT` / `MLPIPE_TOKEN`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("MLPIPE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(token) = std::env::var("MLPIPE_TOKEN") {
            config.token = Some(token);
        }
        config
    }
}

/// Managed feature repository and its query engine
#[async_trait]
pub trait FeatureStoreApi: Send + Sync {
    /// Create a feature group; `Conflict` when it already exists
    async fn create_feature_group(&self, group: &FeatureGroupConfig) -> Result<(), ApiError>;

    async fn describe_feature_group(
        &self,
        name: &str,
    ) -> Result<FeatureGroupDescription, ApiError>;

    async fn put_record(&self, group: &str, record: &Record) -> Result<(), ApiError>;

    /// Read a record from the online store by identifier
    async fn get_record(&self, group: &str, record_id: &str)
        -> Result<Option<Record>, ApiError>;

    /// Submit a query against the offline store; returns the query id
    async fn start_query(&self, sql: &str, output_location: &str) -> Result<String, ApiError>;

    async fn describe_query(&self, query_id: &str) -> Result<QueryDescription, ApiError>;
}

/// Remote pipeline execution engine
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Create or update a pipeline definition
    async fn upsert_pipeline(&self, definition: &PipelineDefinition) -> Result<(), ApiError>;

    /// Start a run; returns the run id
    async fn start_run(
        &self,
        pipeline: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ApiError>;

    async fn describe_run(&self, run_id: &str) -> Result<RunDescription, ApiError>;
}

/// Model hosting: artifacts, models, endpoints
#[async_trait]
pub trait InferenceApi: Send + Sync {
    /// Upload a packaged artifact under the given location; returns its URI
    async fn upload_artifact(&self, location: &str, payload: Vec<u8>)
        -> Result<String, ApiError>;

    async fn create_model(
        &self,
        name: &str,
        image: &str,
        artifact_uri: &str,
        environment: &BTreeMap<String, String>,
    ) -> Result<(), ApiError>;

    async fn create_endpoint(
        &self,
        name: &str,
        model: &str,
        resources: &ResourceRequirements,
    ) -> Result<(), ApiError>;

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription, ApiError>;

    async fn invoke_endpoint(
        &self,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
}
