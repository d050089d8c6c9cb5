//! Remote resource status models
//!
//! Every status here is reported by the platform; the client never advances
//! a resource's lifecycle on its own, it only observes it through polling.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a feature group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Store is being provisioned
    Creating,
    /// Store accepts reads and writes
    Active,
    /// Provisioning failed
    CreateFailed,
    /// Store is being torn down
    Deleting,
}

impl ResourceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceStatus::Active | ResourceStatus::CreateFailed)
    }
}

/// Status of a pipeline run on the remote execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run accepted but not started
    Pending,
    /// Steps are executing
    Executing,
    /// All steps finished successfully
    Succeeded,
    /// A step failed
    Failed,
    /// Run was stopped by request
    Stopped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Stopped
        )
    }
}

/// Status of an inference endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointStatus {
    /// Instances are being provisioned and the container is starting
    Creating,
    /// A new configuration is being rolled out
    Updating,
    /// Endpoint answers invocations
    InService,
    /// Provisioning or health checks failed
    Failed,
    /// Endpoint is being removed
    Deleting,
}

impl EndpointStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EndpointStatus::InService | EndpointStatus::Failed)
    }
}

/// Status of an offline-store query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryStatus::Succeeded | QueryStatus::Failed | QueryStatus::Cancelled
        )
    }
}
