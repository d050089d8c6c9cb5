//! Scripted platform mock for deterministic, fast flow tests
//!
//! The mock plays back prepared status sequences: each describe call pops
//! the next scripted state, and the final state repeats. That makes
//! polling flows testable without a platform or wall-clock waits.

#![allow(dead_code)]

use async_trait::async_trait;
use mlpipe::client::{
    ApiError, EndpointDescription, FeatureGroupDescription, FeatureStoreApi, InferenceApi,
    PipelineApi, QueryDescription, RunDescription,
};
use mlpipe::core::artifact::ResourceRequirements;
use mlpipe::core::pipeline::PipelineDefinition;
use mlpipe::core::record::{FeatureGroupConfig, Record};
use mlpipe::core::state::{EndpointStatus, QueryStatus, ResourceStatus, RunStatus};
use mlpipe::flows::{EventHandler, FlowEvent, Poller};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared scripted state behind a cloneable handle
#[derive(Default)]
pub struct MockState {
    /// Groups that exist; create_feature_group returns Conflict for these
    pub existing_groups: Mutex<HashSet<String>>,
    pub group_statuses: Mutex<VecDeque<FeatureGroupDescription>>,
    pub put_records: Mutex<Vec<(String, Record)>>,
    /// get_record calls that miss before the stored record becomes visible
    pub record_misses: Mutex<usize>,
    pub stored_record: Mutex<Option<Record>>,
    pub queries: Mutex<Vec<(String, String)>>,
    pub query_statuses: Mutex<VecDeque<QueryDescription>>,
    pub upserted: Mutex<Vec<serde_json::Value>>,
    pub started_runs: Mutex<Vec<(String, HashMap<String, String>)>>,
    pub run_statuses: Mutex<VecDeque<RunDescription>>,
    pub uploaded: Mutex<Vec<(String, usize)>>,
    pub existing_models: Mutex<HashSet<String>>,
    pub created_models: Mutex<Vec<String>>,
    pub existing_endpoints: Mutex<HashSet<String>>,
    pub created_endpoints: Mutex<Vec<(String, String)>>,
    pub endpoint_statuses: Mutex<VecDeque<EndpointDescription>>,
    pub invocations: Mutex<Vec<(String, serde_json::Value)>>,
}

/// Cloneable mock implementing every platform API
#[derive(Clone, Default)]
pub struct MockPlatform {
    pub state: Arc<MockState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the describe sequence for a feature group
    pub fn script_group(&self, name: &str, statuses: &[ResourceStatus]) {
        let mut queue = self.state.group_statuses.lock().unwrap();
        for status in statuses {
            queue.push_back(FeatureGroupDescription {
                name: name.to_string(),
                status: *status,
                failure_reason: None,
                offline_table: None,
            });
        }
    }

    /// Script a feature group creation failure with a reason
    pub fn script_group_failure(&self, name: &str, reason: &str) {
        self.state
            .group_statuses
            .lock()
            .unwrap()
            .push_back(FeatureGroupDescription {
                name: name.to_string(),
                status: ResourceStatus::CreateFailed,
                failure_reason: Some(reason.to_string()),
                offline_table: None,
            });
    }

    /// Script the describe sequence for a run
    pub fn script_run(&self, run_id: &str, statuses: &[RunStatus]) {
        let mut queue = self.state.run_statuses.lock().unwrap();
        for status in statuses {
            queue.push_back(RunDescription {
                run_id: run_id.to_string(),
                status: *status,
                failure_reason: None,
                failed_step: None,
            });
        }
    }

    /// Script a run failure pointing at a step
    pub fn script_run_failure(&self, run_id: &str, reason: &str, failed_step: &str) {
        self.state
            .run_statuses
            .lock()
            .unwrap()
            .push_back(RunDescription {
                run_id: run_id.to_string(),
                status: RunStatus::Failed,
                failure_reason: Some(reason.to_string()),
                failed_step: Some(failed_step.to_string()),
            });
    }

    /// Script the describe sequence for an endpoint
    pub fn script_endpoint(&self, name: &str, statuses: &[EndpointStatus]) {
        let mut queue = self.state.endpoint_statuses.lock().unwrap();
        for status in statuses {
            queue.push_back(EndpointDescription {
                name: name.to_string(),
                status: *status,
                failure_reason: None,
            });
        }
    }

    /// Script an endpoint failure with a reason
    pub fn script_endpoint_failure(&self, name: &str, reason: &str) {
        self.state
            .endpoint_statuses
            .lock()
            .unwrap()
            .push_back(EndpointDescription {
                name: name.to_string(),
                status: EndpointStatus::Failed,
                failure_reason: Some(reason.to_string()),
            });
    }

    /// Pop the next scripted state; the final state repeats
    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>, what: &str) -> Result<T, ApiError> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| ApiError::Internal(format!("no scripted {} status", what)))
        }
    }
}

#[async_trait]
impl FeatureStoreApi for MockPlatform {
    async fn create_feature_group(&self, group: &FeatureGroupConfig) -> Result<(), ApiError> {
        let mut existing = self.state.existing_groups.lock().unwrap();
        if existing.contains(&group.name) {
            return Err(ApiError::Conflict(format!("feature group {}", group.name)));
        }
        existing.insert(group.name.clone());
        Ok(())
    }

    async fn describe_feature_group(
        &self,
        _name: &str,
    ) -> Result<FeatureGroupDescription, ApiError> {
        Self::next(&self.state.group_statuses, "feature group")
    }

    async fn put_record(&self, group: &str, record: &Record) -> Result<(), ApiError> {
        self.state
            .put_records
            .lock()
            .unwrap()
            .push((group.to_string(), record.clone()));
        Ok(())
    }

    async fn get_record(
        &self,
        _group: &str,
        _record_id: &str,
    ) -> Result<Option<Record>, ApiError> {
        let mut misses = self.state.record_misses.lock().unwrap();
        if *misses > 0 {
            *misses -= 1;
            return Ok(None);
        }
        Ok(self.state.stored_record.lock().unwrap().clone())
    }

    async fn start_query(&self, sql: &str, output_location: &str) -> Result<String, ApiError> {
        self.state
            .queries
            .lock()
            .unwrap()
            .push((sql.to_string(), output_location.to_string()));
        Ok("q-1".to_string())
    }

    async fn describe_query(&self, _query_id: &str) -> Result<QueryDescription, ApiError> {
        Self::next(&self.state.query_statuses, "query")
    }
}

#[async_trait]
impl PipelineApi for MockPlatform {
    async fn upsert_pipeline(&self, definition: &PipelineDefinition) -> Result<(), ApiError> {
        let value = serde_json::to_value(definition)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        self.state.upserted.lock().unwrap().push(value);
        Ok(())
    }

    async fn start_run(
        &self,
        pipeline: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ApiError> {
        self.state
            .started_runs
            .lock()
            .unwrap()
            .push((pipeline.to_string(), parameters.clone()));
        Ok("run-1".to_string())
    }

    async fn describe_run(&self, _run_id: &str) -> Result<RunDescription, ApiError> {
        Self::next(&self.state.run_statuses, "run")
    }
}

#[async_trait]
impl InferenceApi for MockPlatform {
    async fn upload_artifact(
        &self,
        location: &str,
        payload: Vec<u8>,
    ) -> Result<String, ApiError> {
        self.state
            .uploaded
            .lock()
            .unwrap()
            .push((location.to_string(), payload.len()));
        Ok(format!("store://artifacts/{}", location))
    }

    async fn create_model(
        &self,
        name: &str,
        _image: &str,
        _artifact_uri: &str,
        _environment: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        if self.state.existing_models.lock().unwrap().contains(name) {
            return Err(ApiError::Conflict(format!("model {}", name)));
        }
        self.state
            .created_models
            .lock()
            .unwrap()
            .push(name.to_string());
        Ok(())
    }

    async fn create_endpoint(
        &self,
        name: &str,
        model: &str,
        _resources: &ResourceRequirements,
    ) -> Result<(), ApiError> {
        if self.state.existing_endpoints.lock().unwrap().contains(name) {
            return Err(ApiError::Conflict(format!("endpoint {}", name)));
        }
        self.state
            .created_endpoints
            .lock()
            .unwrap()
            .push((name.to_string(), model.to_string()));
        Ok(())
    }

    async fn describe_endpoint(&self, _name: &str) -> Result<EndpointDescription, ApiError> {
        Self::next(&self.state.endpoint_statuses, "endpoint")
    }

    async fn invoke_endpoint(
        &self,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.state
            .invocations
            .lock()
            .unwrap()
            .push((name.to_string(), payload.clone()));
        Ok(serde_json::json!({ "generated_text": "ok" }))
    }
}

/// A poller that runs the scripted sequences without real waits
pub fn fast_poller() -> Poller {
    Poller::new(Duration::from_millis(1), 20)
}

/// Collect flow events for assertions
pub fn capture_events() -> (EventHandler, Arc<Mutex<Vec<FlowEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let handler: EventHandler = Arc::new(move |event| sink.lock().unwrap().push(event));
    (handler, events)
}

/// The feature group schema used across scenario tests
pub fn customers_schema() -> FeatureGroupConfig {
    FeatureGroupConfig::from_yaml(
        r#"
name: "customers"
record_identifier: "customer-id"
event_time_feature: "event-time"
features:
  - name: "customer-id"
    type: string
  - name: "event-time"
    type: fractional
  - name: "age"
    type: integral
  - name: "city"
    type: string
"#,
    )
    .unwrap()
}
