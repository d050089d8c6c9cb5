//! mlpipe - orchestration for a managed ML platform
//!
//! Feature store provisioning, pipeline submission, and model deployment.
//! All heavy lifting happens on the remote platform; this crate declares,
//! validates, submits, and polls.

pub mod cli;
pub mod client;
pub mod core;
pub mod flows;
pub mod persistence;

// Re-export commonly used types
pub use crate::client::{
    ApiError, FeatureStoreApi, HttpPlatformClient, InferenceApi, PipelineApi, PlatformConfig,
};
pub use crate::core::{
    DeploymentConfig, FeatureGroupConfig, JoinQuery, PipelineConfig, PipelineGraph, Record,
};
pub use crate::flows::{
    Deployer, EventHandler, FlowEvent, PipelineRunner, PollError, Poller, Provisioner, Readiness,
};
pub use crate::persistence::{FlowKind, HistoryBackend, InMemoryHistory, RunRecord};
