//! Scenario tests for the model deployment flow

mod common;

use common::{capture_events, fast_poller, MockPlatform};
use mlpipe::core::artifact::DeploymentConfig;
use mlpipe::core::state::EndpointStatus;
use mlpipe::flows::{Deployer, FlowEvent};
use std::path::Path;

fn deployment_config(handler: &Path) -> DeploymentConfig {
    DeploymentConfig::from_yaml(&format!(
        r#"
model_name: "falcon-40b-chat"
image: "registry.local/lmi-serving:0.27"
engine: "deepspeed"
model_id: "tiiuae/falcon-40b"
tensor_parallel_degree: 8
dtype: "fp16"
handler: "{}"
requirements:
  - "einops"
resources:
  instance_type: "gpu.48xlarge"
  startup_timeout_secs: 60
"#,
        handler.display()
    ))
    .unwrap()
}

fn write_handler(dir: &Path) -> std::path::PathBuf {
    let handler = dir.join("inference.py");
    std::fs::write(&handler, "def handle(inputs):\n    return inputs\n").unwrap();
    handler
}

#[tokio::test]
async fn test_deploy_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = deployment_config(&write_handler(dir.path()));

    let mock = MockPlatform::new();
    mock.script_endpoint(
        "falcon-40b-chat-endpoint",
        &[
            EndpointStatus::Creating,
            EndpointStatus::Creating,
            EndpointStatus::InService,
        ],
    );

    let (handler, events) = capture_events();
    let deployer = Deployer::new(mock.clone())
        .with_poller(fast_poller())
        .with_events(handler);

    let endpoint = deployer.deploy(&config, dir.path()).await.unwrap();
    assert_eq!(endpoint, "falcon-40b-chat-endpoint");

    // artifact was packaged and uploaded under the model's location
    let uploaded = mock.state.uploaded.lock().unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].0, "models/falcon-40b-chat");
    assert!(uploaded[0].1 > 0);

    assert_eq!(
        mock.state.created_models.lock().unwrap().as_slice(),
        ["falcon-40b-chat".to_string()]
    );
    let endpoints = mock.state.created_endpoints.lock().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].1, "falcon-40b-chat");

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, FlowEvent::ArtifactPackaged { .. })));
    assert!(events.iter().any(
        |e| matches!(e, FlowEvent::EndpointInService { name } if name == "falcon-40b-chat-endpoint")
    ));
}

#[tokio::test]
async fn test_deploy_surfaces_endpoint_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = deployment_config(&write_handler(dir.path()));

    let mock = MockPlatform::new();
    mock.script_endpoint("falcon-40b-chat-endpoint", &[EndpointStatus::Creating]);
    mock.script_endpoint_failure(
        "falcon-40b-chat-endpoint",
        "insufficient accelerator capacity",
    );

    let deployer = Deployer::new(mock).with_poller(fast_poller());

    let error = deployer.deploy(&config, dir.path()).await.unwrap_err();
    let message = error.to_string();
    assert!(message.contains("endpoint falcon-40b-chat-endpoint"));
    assert!(message.contains("insufficient accelerator capacity"));
}

#[tokio::test]
async fn test_deploy_reuses_existing_model_and_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = deployment_config(&write_handler(dir.path()));

    let mock = MockPlatform::new();
    mock.state
        .existing_models
        .lock()
        .unwrap()
        .insert("falcon-40b-chat".to_string());
    mock.state
        .existing_endpoints
        .lock()
        .unwrap()
        .insert("falcon-40b-chat-endpoint".to_string());
    mock.script_endpoint("falcon-40b-chat-endpoint", &[EndpointStatus::InService]);

    let deployer = Deployer::new(mock.clone()).with_poller(fast_poller());

    let endpoint = deployer.deploy(&config, dir.path()).await.unwrap();
    assert_eq!(endpoint, "falcon-40b-chat-endpoint");

    // nothing was recreated, the artifact still went up
    assert!(mock.state.created_models.lock().unwrap().is_empty());
    assert!(mock.state.created_endpoints.lock().unwrap().is_empty());
    assert_eq!(mock.state.uploaded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invoke_passes_payload_through() {
    let mock = MockPlatform::new();
    let deployer = Deployer::new(mock.clone()).with_poller(fast_poller());

    let payload = serde_json::json!({ "inputs": "What is a feature store?" });
    let response = deployer
        .invoke("falcon-40b-chat-endpoint", &payload)
        .await
        .unwrap();

    assert_eq!(response["generated_text"], "ok");
    let invocations = mock.state.invocations.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].0, "falcon-40b-chat-endpoint");
    assert_eq!(invocations[0].1, payload);
}
