//! Pipeline configuration from YAML

use crate::core::pipeline::PipelineGraph;
use crate::core::record::is_valid_resource_name;
use crate::core::step::{InputSource, StepConfig, StepKind};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Default run parameters, overridable at start time
    #[serde(default)]
    pub parameters: HashMap<String, String>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the declaration before submission
    pub fn validate(&self) -> Result<()> {
        if !is_valid_resource_name(&self.name) {
            anyhow::bail!("Invalid pipeline name: {}", self.name);
        }

        // Check that all step IDs are unique
        let mut seen_ids = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        let step_ids: std::collections::HashSet<_> = self.steps.iter().map(|s| &s.id).collect();
        let outputs_of = |id: &str| -> Vec<&str> {
            self.steps
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.outputs.iter().map(|o| o.name.as_str()).collect())
                .unwrap_or_default()
        };

        for step in &self.steps {
            // Explicit dependencies must reference existing steps
            for dep in &step.depends_on {
                if !step_ids.contains(dep) {
                    anyhow::bail!(
                        "Step '{}' depends on non-existent step '{}'",
                        step.id,
                        dep
                    );
                }
            }

            // Inputs must resolve, and references must name declared outputs
            for input in &step.inputs {
                let source = input.resolve().map_err(|e| {
                    anyhow::anyhow!("Step '{}': {}", step.id, e)
                })?;
                if let InputSource::StepOutput {
                    step: source_step,
                    output,
                } = source
                {
                    if source_step == step.id {
                        anyhow::bail!("Step '{}' references its own output", step.id);
                    }
                    if !step_ids.contains(&source_step) {
                        anyhow::bail!(
                            "Step '{}' input '{}' references non-existent step '{}'",
                            step.id,
                            input.name,
                            source_step
                        );
                    }
                    if !outputs_of(&source_step).contains(&output.as_str()) {
                        anyhow::bail!(
                            "Step '{}' input '{}' references undeclared output '{}.{}'",
                            step.id,
                            input.name,
                            source_step,
                            output
                        );
                    }
                }
            }

            if let Some(cache) = &step.cache {
                cache
                    .validate()
                    .map_err(|e| anyhow::anyhow!("Step '{}': {}", step.id, e))?;
            }

            self.validate_kind(step, &step_ids)?;
        }

        // Check for cycles over explicit deps, input references, and
        // condition branch edges
        self.check_cycles()?;

        Ok(())
    }

    fn validate_kind(
        &self,
        step: &StepConfig,
        step_ids: &std::collections::HashSet<&String>,
    ) -> Result<()> {
        match &step.kind {
            StepKind::Tuning {
                ranges,
                max_jobs,
                max_parallel_jobs,
                ..
            } => {
                if ranges.is_empty() {
                    anyhow::bail!("Tuning step '{}' declares no parameter ranges", step.id);
                }
                let mut seen = std::collections::HashSet::new();
                for range in ranges {
                    range
                        .validate()
                        .map_err(|e| anyhow::anyhow!("Step '{}': {}", step.id, e))?;
                    if !seen.insert(range.name()) {
                        anyhow::bail!(
                            "Tuning step '{}' declares range '{}' twice",
                            step.id,
                            range.name()
                        );
                    }
                }
                if *max_parallel_jobs == 0 || *max_jobs == 0 {
                    anyhow::bail!("Tuning step '{}' requires max_jobs >= 1", step.id);
                }
                if max_parallel_jobs > max_jobs {
                    anyhow::bail!(
                        "Tuning step '{}' has max_parallel_jobs {} > max_jobs {}",
                        step.id,
                        max_parallel_jobs,
                        max_jobs
                    );
                }
            }
            StepKind::CreateModel { model_data, .. } => {
                if !model_data.contains("://") {
                    let reference = model_data.split_once('.');
                    match reference {
                        Some((source_step, output))
                            if !source_step.is_empty() && !output.is_empty() =>
                        {
                            if !step_ids.contains(&source_step.to_string()) {
                                anyhow::bail!(
                                    "Step '{}' model_data references non-existent step '{}'",
                                    step.id,
                                    source_step
                                );
                            }
                        }
                        _ => anyhow::bail!(
                            "Step '{}' model_data '{}' is neither a URI nor <step>.<output>",
                            step.id,
                            model_data
                        ),
                    }
                }
            }
            StepKind::Condition {
                condition,
                if_true,
                if_false,
            } => {
                let source = condition.source_step().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Step '{}' metric '{}' is not of the form <step>.<output>:<key>",
                        step.id,
                        condition.metric
                    )
                })?;
                if !step_ids.contains(&source.to_string()) {
                    anyhow::bail!(
                        "Step '{}' metric references non-existent step '{}'",
                        step.id,
                        source
                    );
                }
                for target in if_true.iter().chain(if_false.iter()) {
                    if !step_ids.contains(target) {
                        anyhow::bail!(
                            "Step '{}' branch references non-existent step '{}'",
                            step.id,
                            target
                        );
                    }
                    if target == &step.id {
                        anyhow::bail!("Step '{}' branches to itself", step.id);
                    }
                }
                if let Some(target) = if_true.iter().find(|t| if_false.contains(t)) {
                    anyhow::bail!(
                        "Step '{}' lists '{}' in both branches",
                        step.id,
                        target
                    );
                }
            }
            StepKind::RegisterModel {
                model_package_group,
                ..
            } => {
                if !is_valid_resource_name(model_package_group) {
                    anyhow::bail!(
                        "Step '{}' has invalid model package group '{}'",
                        step.id,
                        model_package_group
                    );
                }
            }
            StepKind::Processing { image, .. } => {
                if image.is_empty() {
                    anyhow::bail!("Step '{}' has an empty image", step.id);
                }
            }
        }
        Ok(())
    }

    /// Check for cycles in the effective dependency graph
    fn check_cycles(&self) -> Result<()> {
        let mut visited = std::collections::HashSet::new();
        let mut recursion_stack = std::collections::HashSet::new();

        for step in &self.steps {
            if !visited.contains(&step.id) {
                self.dfs_check(&step.id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    /// Upstream edges of a step: explicit deps, input references, and the
    /// metric source; branch targets gain an edge back to the condition.
    fn upstream_of(&self, step_id: &str) -> Vec<String> {
        let mut edges = Vec::new();

        if let Some(step) = self.steps.iter().find(|s| s.id == step_id) {
            edges.extend(step.depends_on.clone());
            for input in &step.inputs {
                if let Ok(InputSource::StepOutput { step: source, .. }) = input.resolve() {
                    edges.push(source);
                }
            }
            if let StepKind::Condition { condition, .. } = &step.kind {
                if let Some(source) = condition.source_step() {
                    edges.push(source.to_string());
                }
            }
        }

        for step in &self.steps {
            if let StepKind::Condition {
                if_true, if_false, ..
            } = &step.kind
            {
                if if_true.iter().chain(if_false.iter()).any(|t| t == step_id) {
                    edges.push(step.id.clone());
                }
            }
        }

        edges
    }

    fn dfs_check(
        &self,
        step_id: &str,
        visited: &mut std::collections::HashSet<String>,
        recursion_stack: &mut std::collections::HashSet<String>,
    ) -> Result<()> {
        visited.insert(step_id.to_string());
        recursion_stack.insert(step_id.to_string());

        for dep in self.upstream_of(step_id) {
            if recursion_stack.contains(&dep) {
                anyhow::bail!("Cycle detected in dependency graph involving step '{}'", dep);
            }
            if !visited.contains(&dep) {
                self.dfs_check(&dep, visited, recursion_stack)?;
            }
        }

        recursion_stack.remove(step_id);
        Ok(())
    }

    /// Convert config to a pipeline graph
    pub fn to_graph(&self) -> PipelineGraph {
        PipelineGraph::from_config(self)
    }
}
