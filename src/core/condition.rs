//! Metric condition model for conditional registration

use serde::{Deserialize, Serialize};

/// Comparison operator applied to a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ConditionOp {
    /// Evaluate `value <op> threshold`
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            ConditionOp::Lt => value < threshold,
            ConditionOp::Lte => value <= threshold,
            ConditionOp::Gt => value > threshold,
            ConditionOp::Gte => value >= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ConditionOp::Lt => "<",
            ConditionOp::Lte => "<=",
            ConditionOp::Gt => ">",
            ConditionOp::Gte => ">=",
        }
    }
}

/// A threshold check against a metric produced by an upstream step
///
/// The metric source is spelled `<step>.<output>:<key>`, e.g.
/// `evaluate.metrics:rmse`. The check itself runs on the remote execution
/// engine; locally it is only declared and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCondition {
    /// Metric source reference
    pub metric: String,

    /// Comparison operator
    pub op: ConditionOp,

    /// Threshold the metric is compared against
    pub threshold: f64,
}

impl MetricCondition {
    /// The step the metric is read from, if the reference is well-formed
    pub fn source_step(&self) -> Option<&str> {
        let (step, rest) = self.metric.split_once('.')?;
        // require the "<output>:<key>" tail
        rest.split_once(':')?;
        if step.is_empty() {
            None
        } else {
            Some(step)
        }
    }

    /// Whether a concrete metric value satisfies the condition
    pub fn holds(&self, value: f64) -> bool {
        self.op.evaluate(value, self.threshold)
    }
}
