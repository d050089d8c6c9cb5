//! Pipeline graph domain model
//!
//! The graph is declared locally and submitted whole; the remote execution
//! engine owns scheduling, retries, and caching. The only graph work done
//! here is dependency resolution and a deterministic ordering for display
//! and submission.

use crate::core::{
    config::PipelineConfig,
    step::{CachePolicy, InputSource, Step, StepKind},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A validated pipeline graph
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    /// Pipeline name
    pub name: String,

    /// Default run parameters
    pub parameters: HashMap<String, String>,

    /// Steps by id
    pub steps: HashMap<String, Step>,

    /// Deterministic topological order (not serialized)
    execution_order: Vec<String>,
}

impl PipelineGraph {
    /// Build a graph from a configuration that already passed validation
    pub fn from_config(config: &PipelineConfig) -> Self {
        let steps: HashMap<String, Step> = config
            .steps
            .iter()
            .map(|step_config| {
                let step = Step::from_config(step_config);
                (step.id.clone(), step)
            })
            .collect();

        let dependencies = Self::dependency_map(&steps);
        let execution_order = Self::topological_sort(&steps, &dependencies);

        PipelineGraph {
            name: config.name.clone(),
            parameters: config.parameters.clone(),
            steps,
            execution_order,
        }
    }

    /// Get a step by id
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Deterministic topological order of step ids
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Effective upstream dependencies of a step, including the implicit
    /// edge from a condition step to its branch targets
    pub fn dependencies_of(&self, id: &str) -> Vec<String> {
        Self::dependency_map(&self.steps)
            .remove(id)
            .unwrap_or_default()
    }

    /// Branch a condition step would select for a concrete metric value
    pub fn selected_branch(&self, step_id: &str, metric_value: f64) -> Option<Vec<String>> {
        match &self.step(step_id)?.kind {
            StepKind::Condition {
                condition,
                if_true,
                if_false,
            } => {
                if condition.holds(metric_value) {
                    Some(if_true.clone())
                } else {
                    Some(if_false.clone())
                }
            }
            _ => None,
        }
    }

    /// Explicit and implicit dependency edges for every step
    fn dependency_map(steps: &HashMap<String, Step>) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = steps
            .iter()
            .map(|(id, step)| (id.clone(), step.effective_dependencies()))
            .collect();

        // branch targets run only after their condition step
        for step in steps.values() {
            for target in step.branch_targets() {
                if let Some(deps) = map.get_mut(target) {
                    if !deps.contains(&step.id) {
                        deps.push(step.id.clone());
                    }
                }
            }
        }

        map
    }

    fn topological_sort(
        steps: &HashMap<String, Step>,
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        // Sort for deterministic order
        let mut step_ids: Vec<_> = steps.keys().cloned().collect();
        step_ids.sort();

        for step_id in step_ids {
            if !visited.contains(&step_id) {
                Self::visit(&step_id, dependencies, &mut visited, &mut result);
            }
        }

        result
    }

    fn visit(
        step_id: &str,
        dependencies: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(step_id) {
            return;
        }
        visited.insert(step_id.to_string());

        if let Some(deps) = dependencies.get(step_id) {
            let mut deps = deps.clone();
            deps.sort();
            for dep in deps {
                Self::visit(&dep, dependencies, visited, result);
            }
        }

        result.push(step_id.to_string());
    }

    /// Assemble the submission payload the execution engine accepts
    pub fn to_definition(&self) -> PipelineDefinition {
        let dependencies = Self::dependency_map(&self.steps);

        let steps = self
            .execution_order
            .iter()
            .filter_map(|id| self.steps.get(id))
            .map(|step| {
                let inputs = step
                    .inputs
                    .iter()
                    .map(|(name, source)| match source {
                        InputSource::Uri(uri) => DefinedInput::Uri {
                            name: name.clone(),
                            uri: uri.clone(),
                        },
                        InputSource::StepOutput { step, output } => DefinedInput::Reference {
                            name: name.clone(),
                            step: step.clone(),
                            output: output.clone(),
                        },
                    })
                    .collect();

                let mut depends_on = dependencies.get(&step.id).cloned().unwrap_or_default();
                depends_on.sort();

                StepDefinition {
                    id: step.id.clone(),
                    kind: step.kind.clone(),
                    inputs,
                    outputs: step.outputs.clone(),
                    depends_on,
                    cache: step.cache.clone(),
                }
            })
            .collect();

        PipelineDefinition {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            steps,
        }
    }
}

/// Submission payload for the remote execution engine
#[derive(Debug, Clone, Serialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub parameters: HashMap<String, String>,
    pub steps: Vec<StepDefinition>,
}

/// One step of the submission payload
#[derive(Debug, Clone, Serialize)]
pub struct StepDefinition {
    pub id: String,

    #[serde(flatten)]
    pub kind: StepKind,

    pub inputs: Vec<DefinedInput>,
    pub outputs: Vec<String>,
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicy>,
}

/// A resolved input in the submission payload
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DefinedInput {
    Uri { name: String, uri: String },
    Reference { name: String, step: String, output: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;

    const CHURN_PIPELINE: &str = r#"
name: "churn-train"
parameters:
  approval: "pending_manual"
steps:
  - id: "preprocess"
    name: "Preprocess"
    kind: processing
    image: "registry.local/prep:1.0"
    inputs:
      - name: "raw"
        source: "store://datasets/churn/raw"
    outputs:
      - name: "train"
      - name: "validation"
    cache:
      enabled: true
      expire_after: "30d"

  - id: "tune"
    name: "Tune"
    kind: tuning
    image: "registry.local/trainer:1.2"
    objective_metric: "validation:rmse"
    ranges:
      - type: continuous
        name: "eta"
        min: 0.01
        max: 0.3
    inputs:
      - name: "train"
        from: "preprocess.train"
      - name: "validation"
        from: "preprocess.validation"
    outputs:
      - name: "model"

  - id: "evaluate"
    name: "Evaluate"
    kind: processing
    image: "registry.local/eval:1.0"
    inputs:
      - name: "model"
        from: "tune.model"
      - name: "validation"
        from: "preprocess.validation"
    outputs:
      - name: "metrics"

  - id: "check-quality"
    name: "Check Quality"
    kind: condition
    metric: "evaluate.metrics:rmse"
    op: lte
    threshold: 3.0
    if_true: ["register"]

  - id: "register"
    name: "Register"
    kind: register_model
    model_package_group: "churn-models"
    inputs:
      - name: "model"
        from: "tune.model"
"#;

    #[test]
    fn test_topological_order_respects_references() {
        let config = PipelineConfig::from_yaml(CHURN_PIPELINE).unwrap();
        let graph = config.to_graph();

        let order = graph.execution_order();
        let position =
            |id: &str| order.iter().position(|x| x == id).unwrap();

        assert!(position("preprocess") < position("tune"));
        assert!(position("tune") < position("evaluate"));
        assert!(position("evaluate") < position("check-quality"));
        assert!(position("check-quality") < position("register"));
    }

    #[test]
    fn test_branch_target_depends_on_condition() {
        let config = PipelineConfig::from_yaml(CHURN_PIPELINE).unwrap();
        let graph = config.to_graph();

        let deps = graph.dependencies_of("register");
        assert!(deps.contains(&"check-quality".to_string()));
        assert!(deps.contains(&"tune".to_string()));
    }

    #[test]
    fn test_selected_branch_below_threshold_registers() {
        let config = PipelineConfig::from_yaml(CHURN_PIPELINE).unwrap();
        let graph = config.to_graph();

        // metric below the threshold selects the registration branch
        assert_eq!(
            graph.selected_branch("check-quality", 2.4),
            Some(vec!["register".to_string()])
        );
        // above the threshold it is skipped
        assert_eq!(
            graph.selected_branch("check-quality", 3.5),
            Some(vec![])
        );
        // not a condition step
        assert_eq!(graph.selected_branch("tune", 2.4), None);
    }

    #[test]
    fn test_definition_carries_steps_in_order() {
        let config = PipelineConfig::from_yaml(CHURN_PIPELINE).unwrap();
        let definition = config.to_graph().to_definition();

        assert_eq!(definition.name, "churn-train");
        assert_eq!(definition.steps.len(), 5);
        assert_eq!(definition.steps[0].id, "preprocess");

        let json = serde_json::to_value(&definition).unwrap();
        let steps = json["steps"].as_array().unwrap();
        assert_eq!(steps[0]["kind"], "processing");
        assert_eq!(steps[0]["cache"]["expire_after"], "30d");

        let tune = steps
            .iter()
            .find(|s| s["id"] == "tune")
            .unwrap();
        assert_eq!(tune["inputs"][0]["step"], "preprocess");
    }
}
