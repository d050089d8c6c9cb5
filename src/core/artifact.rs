//! Deployment artifact model
//!
//! A deployment is a packaged inference handler plus the string-templated
//! serving config the third-party container reads at startup, plus declared
//! resource requirements for the endpoint behind it.

use crate::core::record::is_valid_resource_name;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Resource requirements declared for the serving endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Accelerated instance type hosting the model
    pub instance_type: String,

    #[serde(default = "default_instance_count")]
    pub instance_count: u32,

    /// How long the platform waits for the container to come up. Large
    /// models routinely take many minutes to download and shard.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    #[serde(default)]
    pub volume_gb: Option<u32>,
}

fn default_instance_count() -> u32 {
    1
}

fn default_startup_timeout() -> u64 {
    1800
}

/// Deployment declaration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Model name (platform naming rule applies)
    pub model_name: String,

    /// Serving container image
    pub image: String,

    /// Inference engine inside the container
    pub engine: String,

    /// Hub identifier of the model to load
    #[serde(default)]
    pub model_id: Option<String>,

    /// Pre-uploaded model weights, as an object-store URI
    #[serde(default)]
    pub model_data: Option<String>,

    /// Number of accelerators one model replica is sharded across
    #[serde(default = "default_tensor_parallel_degree")]
    pub tensor_parallel_degree: u32,

    #[serde(default)]
    pub dtype: Option<String>,

    /// Local path of the user-supplied inference handler script
    #[serde(default)]
    pub handler: Option<String>,

    /// Extra python dependencies the handler needs
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Additional `option.*` serving properties
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Container environment variables
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    pub resources: ResourceRequirements,

    /// Object-store prefix the packaged artifact is uploaded under
    #[serde(default)]
    pub artifact_location: Option<String>,
}

fn default_tensor_parallel_degree() -> u32 {
    1
}

impl DeploymentConfig {
    /// Load a deployment declaration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a deployment declaration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DeploymentConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_resource_name(&self.model_name) {
            anyhow::bail!("Invalid model name: {}", self.model_name);
        }

        if self.model_id.is_none() && self.model_data.is_none() {
            anyhow::bail!(
                "Deployment '{}' must set model_id or model_data",
                self.model_name
            );
        }

        if self.tensor_parallel_degree == 0 {
            anyhow::bail!(
                "Deployment '{}' requires tensor_parallel_degree >= 1",
                self.model_name
            );
        }

        if self.resources.instance_count == 0 {
            anyhow::bail!(
                "Deployment '{}' requires at least one instance",
                self.model_name
            );
        }

        if let Some(handler) = &self.handler {
            if !Path::new(handler).exists() {
                anyhow::bail!(
                    "Handler script does not exist: {}",
                    handler
                );
            }
        }

        Ok(())
    }

    /// Render the serving config read by the container, one `key=value` per
    /// line in deterministic order.
    pub fn serving_properties(&self) -> String {
        let mut lines = vec![format!("engine={}", self.engine)];

        if let Some(handler) = &self.handler {
            let entry_point = Path::new(handler)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| handler.clone());
            lines.push(format!("option.entryPoint={}", entry_point));
        }
        if let Some(model_id) = &self.model_id {
            lines.push(format!("option.model_id={}", model_id));
        }
        if let Some(model_data) = &self.model_data {
            lines.push(format!("option.model_data={}", model_data));
        }
        lines.push(format!(
            "option.tensor_parallel_degree={}",
            self.tensor_parallel_degree
        ));
        if let Some(dtype) = &self.dtype {
            lines.push(format!("option.dtype={}", dtype));
        }
        for (key, value) in &self.options {
            lines.push(format!("option.{}={}", key, value));
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        rendered
    }

    /// Endpoint name derived from the model name
    pub fn endpoint_name(&self) -> String {
        format!("{}-endpoint", self.model_name)
    }
}
