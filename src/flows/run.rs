//! Pipeline submission and run monitoring
//!
//! The graph is declared locally and handed to the execution engine whole;
//! the runner's only responsibilities are correct declaration and watching
//! the run until it reaches a terminal state.

use crate::client::{PipelineApi, RunDescription};
use crate::core::pipeline::PipelineGraph;
use crate::core::state::RunStatus;
use crate::flows::{emit, EventHandler, FlowEvent, Poller, Readiness};
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

/// Drives pipeline submission and run monitoring
pub struct PipelineRunner<C> {
    client: C,
    poller: Poller,
    events: Option<EventHandler>,
}

impl<C: PipelineApi> PipelineRunner<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            poller: Poller::default(),
            events: None,
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_events(mut self, handler: EventHandler) -> Self {
        self.events = Some(handler);
        self
    }

    /// Create or update the pipeline definition on the engine
    pub async fn submit(&self, graph: &PipelineGraph) -> Result<()> {
        let definition = graph.to_definition();
        self.client.upsert_pipeline(&definition).await?;
        info!(
            "Upserted pipeline {} ({} steps)",
            graph.name,
            definition.steps.len()
        );
        emit(
            &self.events,
            FlowEvent::PipelineUpserted {
                name: graph.name.clone(),
            },
        );
        Ok(())
    }

    /// Start a run with parameter overrides; returns the run id
    pub async fn start(
        &self,
        pipeline: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String> {
        let run_id = self.client.start_run(pipeline, parameters).await?;
        info!("Started run {} of pipeline {}", run_id, pipeline);
        emit(
            &self.events,
            FlowEvent::RunStarted {
                pipeline: pipeline.to_string(),
                run_id: run_id.clone(),
            },
        );
        Ok(run_id)
    }

    /// Poll the run until it succeeds or fails; a failed run surfaces the
    /// failing step in the error
    pub async fn wait(&self, run_id: &str) -> Result<RunDescription> {
        let resource = format!("run {}", run_id);
        let client = &self.client;
        self.poller
            .wait_for(&resource, || async move {
                let description = client.describe_run(run_id).await?;
                Ok(match description.status {
                    RunStatus::Succeeded => Readiness::Ready,
                    RunStatus::Pending | RunStatus::Executing => Readiness::Pending,
                    RunStatus::Failed | RunStatus::Stopped => {
                        let mut reason = description
                            .failure_reason
                            .unwrap_or_else(|| format!("status {:?}", description.status));
                        if let Some(step) = description.failed_step {
                            reason = format!("{} (step {})", reason, step);
                        }
                        Readiness::Failed(reason)
                    }
                })
            })
            .await?;

        let description = self.client.describe_run(run_id).await?;
        emit(
            &self.events,
            FlowEvent::RunCompleted {
                run_id: run_id.to_string(),
                status: description.status,
            },
        );
        Ok(description)
    }

    /// Submit, start, and wait in one call
    pub async fn run_to_completion(
        &self,
        graph: &PipelineGraph,
        parameters: &HashMap<String, String>,
    ) -> Result<RunDescription> {
        self.submit(graph).await?;
        let run_id = self.start(&graph.name, parameters).await?;
        self.wait(&run_id).await
    }
}
