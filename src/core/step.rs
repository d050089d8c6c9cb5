//! Step declarations for the pipeline graph
//!
//! Steps only *declare* remote work. Scheduling, retries, and cache hits all
//! happen on the remote execution engine; the local model's job is to carry
//! a correct declaration.

use crate::core::condition::MetricCondition;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Spelling rule for cache expiry, e.g. "12h", "30d", "4w"
const EXPIRY_PATTERN: &str = r"^\d+[hdw]$";

/// Tuning objective direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningGoal {
    #[default]
    Minimize,
    Maximize,
}

/// Approval status attached to a registered model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    #[default]
    PendingManual,
    Rejected,
}

/// A searchable hyperparameter range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterRange {
    Continuous { name: String, min: f64, max: f64 },
    Integer { name: String, min: i64, max: i64 },
    Categorical { name: String, values: Vec<String> },
}

impl ParameterRange {
    pub fn name(&self) -> &str {
        match self {
            ParameterRange::Continuous { name, .. } => name,
            ParameterRange::Integer { name, .. } => name,
            ParameterRange::Categorical { name, .. } => name,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ParameterRange::Continuous { name, min, max } => {
                if min >= max {
                    anyhow::bail!("Range '{}' requires min < max ({} >= {})", name, min, max);
                }
            }
            ParameterRange::Integer { name, min, max } => {
                if min >= max {
                    anyhow::bail!("Range '{}' requires min < max ({} >= {})", name, min, max);
                }
            }
            ParameterRange::Categorical { name, values } => {
                if values.is_empty() {
                    anyhow::bail!("Categorical range '{}' has no values", name);
                }
            }
        }
        Ok(())
    }
}

/// Cache policy forwarded to the execution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(default)]
    pub enabled: bool,

    /// How long a cached step result stays valid, e.g. "30d"
    #[serde(default)]
    pub expire_after: Option<String>,
}

impl CachePolicy {
    pub fn validate(&self) -> Result<()> {
        if let Some(expiry) = &self.expire_after {
            let valid = Regex::new(EXPIRY_PATTERN)
                .map(|re| re.is_match(expiry))
                .unwrap_or(false);
            if !valid {
                anyhow::bail!(
                    "Invalid cache expiry '{}' (expected forms like 12h, 30d, 4w)",
                    expiry
                );
            }
        }
        Ok(())
    }
}

/// Per-kind step payload, tagged by `kind` in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// A container job (preprocessing, evaluation, ...)
    Processing {
        image: String,
        #[serde(default)]
        entrypoint: Vec<String>,
        #[serde(default = "default_instance_type")]
        instance_type: String,
        #[serde(default = "default_instance_count")]
        instance_count: u32,
    },

    /// A hyperparameter search delegated to the managed tuner
    Tuning {
        image: String,
        objective_metric: String,
        #[serde(default)]
        goal: TuningGoal,
        ranges: Vec<ParameterRange>,
        #[serde(default = "default_max_jobs")]
        max_jobs: u32,
        #[serde(default = "default_max_parallel_jobs")]
        max_parallel_jobs: u32,
        #[serde(default)]
        static_parameters: HashMap<String, String>,
    },

    /// Wrap trained artifacts into a servable model
    CreateModel {
        image: String,
        /// Literal URI or `<step>.<output>` reference
        model_data: String,
    },

    /// Register the model into a package group
    RegisterModel {
        model_package_group: String,
        #[serde(default)]
        approval_status: ApprovalStatus,
        #[serde(default)]
        content_types: Vec<String>,
    },

    /// Branch on a metric produced by an upstream step
    Condition {
        #[serde(flatten)]
        condition: MetricCondition,
        #[serde(default)]
        if_true: Vec<String>,
        #[serde(default)]
        if_false: Vec<String>,
    },
}

fn default_instance_type() -> String {
    "cpu.medium".to_string()
}

fn default_instance_count() -> u32 {
    1
}

fn default_max_jobs() -> u32 {
    10
}

fn default_max_parallel_jobs() -> u32 {
    2
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Processing { .. } => "processing",
            StepKind::Tuning { .. } => "tuning",
            StepKind::CreateModel { .. } => "create_model",
            StepKind::RegisterModel { .. } => "register_model",
            StepKind::Condition { .. } => "condition",
        }
    }
}

/// Step configuration as written in the pipeline YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(flatten)]
    pub kind: StepKind,

    /// Explicit upstream dependencies
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub inputs: Vec<StepInput>,

    /// Outputs this step makes available to downstream steps
    #[serde(default)]
    pub outputs: Vec<StepOutput>,

    #[serde(default)]
    pub cache: Option<CachePolicy>,
}

/// A declared step input
///
/// Exactly one of `source` (literal URI) or `from` (`<step>.<output>`
/// reference) must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInput {
    pub name: String,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub from: Option<String>,
}

/// A declared step output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub name: String,

    #[serde(default)]
    pub path: Option<String>,
}

/// Resolved origin of a step input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Uri(String),
    StepOutput { step: String, output: String },
}

impl StepInput {
    /// Resolve the declared source, rejecting ambiguous or malformed inputs
    pub fn resolve(&self) -> Result<InputSource> {
        match (&self.source, &self.from) {
            (Some(uri), None) => Ok(InputSource::Uri(uri.clone())),
            (None, Some(reference)) => {
                let (step, output) = reference.split_once('.').ok_or_else(|| {
                    anyhow::anyhow!(
                        "Input '{}' reference '{}' is not of the form <step>.<output>",
                        self.name,
                        reference
                    )
                })?;
                if step.is_empty() || output.is_empty() {
                    anyhow::bail!(
                        "Input '{}' reference '{}' is not of the form <step>.<output>",
                        self.name,
                        reference
                    );
                }
                Ok(InputSource::StepOutput {
                    step: step.to_string(),
                    output: output.to_string(),
                })
            }
            (Some(_), Some(_)) => anyhow::bail!(
                "Input '{}' sets both 'source' and 'from'",
                self.name
            ),
            (None, None) => anyhow::bail!(
                "Input '{}' sets neither 'source' nor 'from'",
                self.name
            ),
        }
    }
}

/// Step domain model built from a validated configuration
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub inputs: Vec<(String, InputSource)>,
    pub outputs: Vec<String>,
    pub cache: Option<CachePolicy>,
    pub dependencies: Vec<String>,
}

impl Step {
    /// Build a step from a config that already passed validation.
    /// Unresolvable inputs are skipped here; `PipelineConfig::validate`
    /// rejects them before this point.
    pub fn from_config(config: &StepConfig) -> Self {
        let inputs = config
            .inputs
            .iter()
            .filter_map(|input| {
                input
                    .resolve()
                    .ok()
                    .map(|source| (input.name.clone(), source))
            })
            .collect();

        Step {
            id: config.id.clone(),
            kind: config.kind.clone(),
            inputs,
            outputs: config.outputs.iter().map(|o| o.name.clone()).collect(),
            cache: config.cache.clone(),
            dependencies: config.depends_on.clone(),
        }
    }

    /// Explicit dependencies plus steps referenced through inputs
    pub fn effective_dependencies(&self) -> Vec<String> {
        let mut deps = self.dependencies.clone();
        for (_, source) in &self.inputs {
            if let InputSource::StepOutput { step, .. } = source {
                if !deps.contains(step) {
                    deps.push(step.clone());
                }
            }
        }
        if let StepKind::Condition { condition, .. } = &self.kind {
            if let Some(step) = condition.source_step() {
                if !deps.iter().any(|d| d == step) {
                    deps.push(step.to_string());
                }
            }
        }
        // model_data may reference an upstream output instead of a URI
        if let StepKind::CreateModel { model_data, .. } = &self.kind {
            if !model_data.contains("://") {
                if let Some((step, _)) = model_data.split_once('.') {
                    if !step.is_empty() && !deps.iter().any(|d| d == step) {
                        deps.push(step.to_string());
                    }
                }
            }
        }
        deps
    }

    /// Branch targets when this is a condition step
    pub fn branch_targets(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Condition {
                if_true, if_false, ..
            } => if_true
                .iter()
                .chain(if_false.iter())
                .map(|s| s.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_resolution() {
        let literal = StepInput {
            name: "raw".to_string(),
            source: Some("store://datasets/churn/raw".to_string()),
            from: None,
        };
        assert_eq!(
            literal.resolve().unwrap(),
            InputSource::Uri("store://datasets/churn/raw".to_string())
        );

        let reference = StepInput {
            name: "train".to_string(),
            source: None,
            from: Some("preprocess.train".to_string()),
        };
        assert_eq!(
            reference.resolve().unwrap(),
            InputSource::StepOutput {
                step: "preprocess".to_string(),
                output: "train".to_string(),
            }
        );
    }

    #[test]
    fn test_input_rejects_ambiguity() {
        let both = StepInput {
            name: "x".to_string(),
            source: Some("store://x".to_string()),
            from: Some("a.b".to_string()),
        };
        assert!(both.resolve().is_err());

        let neither = StepInput {
            name: "x".to_string(),
            source: None,
            from: None,
        };
        assert!(neither.resolve().is_err());

        let malformed = StepInput {
            name: "x".to_string(),
            source: None,
            from: Some("no-dot".to_string()),
        };
        assert!(malformed.resolve().is_err());
    }

    #[test]
    fn test_parameter_range_validation() {
        assert!(ParameterRange::Continuous {
            name: "eta".to_string(),
            min: 0.0,
            max: 1.0,
        }
        .validate()
        .is_ok());

        assert!(ParameterRange::Integer {
            name: "max_depth".to_string(),
            min: 10,
            max: 2,
        }
        .validate()
        .is_err());

        assert!(ParameterRange::Categorical {
            name: "booster".to_string(),
            values: vec![],
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_cache_policy_expiry_spelling() {
        let ok = CachePolicy {
            enabled: true,
            expire_after: Some("30d".to_string()),
        };
        assert!(ok.validate().is_ok());

        let bad = CachePolicy {
            enabled: true,
            expire_after: Some("thirty days".to_string()),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_step_kind_parses_from_yaml() {
        let yaml = r#"
id: "tune"
name: "Tune"
kind: tuning
image: "registry.local/trainer:1.2"
objective_metric: "validation:rmse"
ranges:
  - type: continuous
    name: "eta"
    min: 0.01
    max: 0.3
  - type: integer
    name: "max_depth"
    min: 2
    max: 10
  - type: categorical
    name: "booster"
    values: ["gbtree", "dart"]
max_jobs: 8
"#;
        let config: StepConfig = serde_yaml::from_str(yaml).unwrap();
        match &config.kind {
            StepKind::Tuning {
                ranges,
                max_jobs,
                max_parallel_jobs,
                goal,
                ..
            } => {
                assert_eq!(ranges.len(), 3);
                assert_eq!(*max_jobs, 8);
                assert_eq!(*max_parallel_jobs, 2);
                assert_eq!(*goal, TuningGoal::Minimize);
            }
            other => panic!("Expected tuning step, got {:?}", other),
        }
    }

    #[test]
    fn test_effective_dependencies_include_input_refs() {
        let config: StepConfig = serde_yaml::from_str(
            r#"
id: "tune"
name: "Tune"
kind: tuning
image: "registry.local/trainer:1.2"
objective_metric: "validation:rmse"
ranges:
  - type: continuous
    name: "eta"
    min: 0.01
    max: 0.3
depends_on: ["setup"]
inputs:
  - name: "train"
    from: "preprocess.train"
"#,
        )
        .unwrap();

        let step = Step::from_config(&config);
        let deps = step.effective_dependencies();
        assert!(deps.contains(&"setup".to_string()));
        assert!(deps.contains(&"preprocess".to_string()));
    }

    #[test]
    fn test_condition_step_branch_targets() {
        let config: StepConfig = serde_yaml::from_str(
            r#"
id: "check-quality"
name: "Check Quality"
kind: condition
metric: "evaluate.metrics:rmse"
op: lte
threshold: 3.0
if_true: ["register"]
"#,
        )
        .unwrap();

        let step = Step::from_config(&config);
        assert_eq!(step.branch_targets(), vec!["register"]);
        assert!(step
            .effective_dependencies()
            .contains(&"evaluate".to_string()));
    }
}
