//! Model deployment flow
//!
//! Package the handler, upload it, create the model and endpoint, and poll
//! until the endpoint serves traffic. An existing model or endpoint with
//! the same name is reused; the platform rolls the new artifact out.

use crate::client::{ApiError, InferenceApi};
use crate::core::artifact::DeploymentConfig;
use crate::core::state::EndpointStatus;
use crate::flows::{emit, package, EventHandler, FlowEvent, Poller, Readiness};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Drives artifact packaging and endpoint provisioning
pub struct Deployer<C> {
    client: C,
    poller: Poller,
    events: Option<EventHandler>,
}

impl<C: InferenceApi> Deployer<C> {
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

    /// Run the whole deployment; returns the endpoint name
    pub async fn deploy(&self, config: &DeploymentConfig, staging_dir: &Path) -> Result<String> {
        let archive = package::package_artifact(config, staging_dir)?;
        emit(
            &self.events,
            FlowEvent::ArtifactPackaged {
                path: archive.clone(),
            },
        );

        let payload = std::fs::read(&archive)
            .with_context(|| format!("Failed to read archive {}", archive.display()))?;
        let location = config
            .artifact_location
            .clone()
            .unwrap_or_else(|| format!("models/{}", config.model_name));
        let uri = self.client.upload_artifact(&location, payload).await?;
        info!("Uploaded artifact to {}", uri);
        emit(&self.events, FlowEvent::ArtifactUploaded { uri: uri.clone() });

        match self
            .client
            .create_model(&config.model_name, &config.image, &uri, &config.environment)
            .await
        {
            Ok(()) => info!("Created model {}", config.model_name),
            Err(ApiError::Conflict(_)) => {
                info!("Model {} already exists, reusing it", config.model_name)
            }
            Err(e) => return Err(e.into()),
        }
        emit(
            &self.events,
            FlowEvent::ModelCreated {
                name: config.model_name.clone(),
            },
        );

        let endpoint = config.endpoint_name();
        match self
            .client
            .create_endpoint(&endpoint, &config.model_name, &config.resources)
            .await
        {
            Ok(()) => info!("Requested endpoint {}", endpoint),
            Err(ApiError::Conflict(_)) => {
                info!("Endpoint {} already exists, rolling out new model", endpoint)
            }
            Err(e) => return Err(e.into()),
        }
        emit(
            &self.events,
            FlowEvent::EndpointCreating {
                name: endpoint.clone(),
            },
        );

        // the startup timeout declared for the container bounds the wait
        self.wait_in_service(&endpoint, config.resources.startup_timeout_secs)
            .await?;
        emit(
            &self.events,
            FlowEvent::EndpointInService {
                name: endpoint.clone(),
            },
        );
        Ok(endpoint)
    }

    /// Poll the endpoint until it is in service
    pub async fn wait_in_service(&self, endpoint: &str, timeout_secs: u64) -> Result<()> {
        let resource = format!("endpoint {}", endpoint);
        let poller = self.poller.covering(timeout_secs);
        let client = &self.client;
        poller
            .wait_for(&resource, || async move {
                let description = client.describe_endpoint(endpoint).await?;
                Ok(match description.status {
                    EndpointStatus::InService => Readiness::Ready,
                    EndpointStatus::Creating | EndpointStatus::Updating => Readiness::Pending,
                    EndpointStatus::Failed | EndpointStatus::Deleting => Readiness::Failed(
                        description
                            .failure_reason
                            .unwrap_or_else(|| format!("status {:?}", description.status)),
                    ),
                })
            })
            .await?;
        Ok(())
    }

    /// One-shot smoke request against a live endpoint
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self.client.invoke_endpoint(endpoint, payload).await?;
        Ok(response)
    }
}
