//! Orchestration flows against the remote platform
//!
//! Each flow is a linear sequence of blocking remote calls plus readiness
//! polling. Flows emit events so the CLI can narrate progress without the
//! flows knowing anything about terminals.

pub mod deploy;
pub mod package;
pub mod poll;
pub mod provision;
pub mod run;

use crate::core::state::RunStatus;
use std::path::PathBuf;
use std::sync::Arc;

pub use deploy::Deployer;
pub use poll::{PollError, Poller, Readiness};
pub use provision::Provisioner;
pub use run::PipelineRunner;

/// Events emitted while a flow progresses
#[derive(Debug, Clone)]
pub enum FlowEvent {
    FeatureGroupCreating { name: String },
    FeatureGroupExists { name: String },
    FeatureGroupReady { name: String },
    RecordsIngested { group: String, count: usize },
    RecordVisible { group: String, record_id: String },
    QueryStarted { query_id: String },
    QueryCompleted {
        query_id: String,
        result_location: Option<String>,
    },
    PipelineUpserted { name: String },
    RunStarted { pipeline: String, run_id: String },
    RunCompleted { run_id: String, status: RunStatus },
    ArtifactPackaged { path: PathBuf },
    ArtifactUploaded { uri: String },
    ModelCreated { name: String },
    EndpointCreating { name: String },
    EndpointInService { name: String },
}

/// Type for flow event handlers
pub type EventHandler = Arc<dyn Fn(FlowEvent) + Send + Sync>;

pub(crate) fn emit(handler: &Option<EventHandler>, event: FlowEvent) {
    if let Some(handler) = handler {
        handler(event);
    }
}
