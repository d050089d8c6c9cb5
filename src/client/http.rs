//! HTTP implementation of the platform APIs

use crate::client::{
    ApiError, EndpointDescription, FeatureGroupDescription, FeatureStoreApi, InferenceApi,
    PipelineApi, PlatformConfig, QueryDescription, RunDescription,
};
use crate::core::artifact::ResourceRequirements;
use crate::core::pipeline::PipelineDefinition;
use crate::core::record::{FeatureGroupConfig, Record};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Platform client speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryStarted {
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct RunStarted {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactUploaded {
    uri: String,
}

impl HttpPlatformClient {
    /// Create a client from platform configuration
    pub fn new(config: PlatformConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map a non-success response to the matching error
    async fn check(
        resource: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            409 => Err(ApiError::Conflict(resource.to_string())),
            404 => Err(ApiError::NotFound(resource.to_string())),
            code => Err(ApiError::Api {
                status: code,
                message,
            }),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        path: &str,
    ) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        let response = Self::check(resource, response).await?;
        Ok(response.json().await?)
    }

    async fn post_json(
        &self,
        resource: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        debug!("POST {}", path);
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Self::check(resource, response).await
    }
}

#[async_trait]
impl FeatureStoreApi for HttpPlatformClient {
    async fn create_feature_group(&self, group: &FeatureGroupConfig) -> Result<(), ApiError> {
        let resource = format!("feature group {}", group.name);
        let body = serde_json::to_value(group)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        self.post_json(&resource, "/feature-groups", &body).await?;
        Ok(())
    }

    async fn describe_feature_group(
        &self,
        name: &str,
    ) -> Result<FeatureGroupDescription, ApiError> {
        let resource = format!("feature group {}", name);
        self.get_json(&resource, &format!("/feature-groups/{}", name))
            .await
    }

    async fn put_record(&self, group: &str, record: &Record) -> Result<(), ApiError> {
        let resource = format!("feature group {}", group);
        let body = serde_json::to_value(record)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        self.post_json(&resource, &format!("/feature-groups/{}/records", group), &body)
            .await?;
        Ok(())
    }

    async fn get_record(
        &self,
        group: &str,
        record_id: &str,
    ) -> Result<Option<Record>, ApiError> {
        let path = format!("/feature-groups/{}/records/{}", group, record_id);
        debug!("GET {}", path);
        let response = self
            .authorize(self.client.get(self.url(&path)))
            .send()
            .await?;

        // a missing record is an expected outcome, not an error
        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        let resource = format!("record {} in {}", record_id, group);
        let response = Self::check(&resource, response).await?;
        Ok(Some(response.json().await?))
    }

    async fn start_query(&self, sql: &str, output_location: &str) -> Result<String, ApiError> {
        let body = json!({ "sql": sql, "output_location": output_location });
        let response = self.post_json("query", "/queries", &body).await?;
        let started: QueryStarted = response.json().await?;
        Ok(started.query_id)
    }

    async fn describe_query(&self, query_id: &str) -> Result<QueryDescription, ApiError> {
        let resource = format!("query {}", query_id);
        self.get_json(&resource, &format!("/queries/{}", query_id))
            .await
    }
}

#[async_trait]
impl PipelineApi for HttpPlatformClient {
    async fn upsert_pipeline(&self, definition: &PipelineDefinition) -> Result<(), ApiError> {
        let resource = format!("pipeline {}", definition.name);
        let path = format!("/pipelines/{}", definition.name);
        debug!("PUT {}", path);
        let response = self
            .authorize(self.client.put(self.url(&path)).json(definition))
            .send()
            .await?;
        Self::check(&resource, response).await?;
        Ok(())
    }

    async fn start_run(
        &self,
        pipeline: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<String, ApiError> {
        let resource = format!("pipeline {}", pipeline);
        let body = json!({ "parameters": parameters });
        let response = self
            .post_json(&resource, &format!("/pipelines/{}/runs", pipeline), &body)
            .await?;
        let started: RunStarted = response.json().await?;
        Ok(started.run_id)
    }

    async fn describe_run(&self, run_id: &str) -> Result<RunDescription, ApiError> {
        let resource = format!("run {}", run_id);
        self.get_json(&resource, &format!("/runs/{}", run_id)).await
    }
}

#[async_trait]
impl InferenceApi for HttpPlatformClient {
    async fn upload_artifact(
        &self,
        location: &str,
        payload: Vec<u8>,
    ) -> Result<String, ApiError> {
        let resource = format!("artifact {}", location);
        let path = format!("/artifacts/{}", location);
        debug!("PUT {} ({} bytes)", path, payload.len());
        let response = self
            .authorize(self.client.put(self.url(&path)).body(payload))
            .send()
            .await?;
        let response = Self::check(&resource, response).await?;
        let uploaded: ArtifactUploaded = response.json().await?;
        Ok(uploaded.uri)
    }

    async fn create_model(
        &self,
        name: &str,
        image: &str,
        artifact_uri: &str,
        environment: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let resource = format!("model {}", name);
        let body = json!({
            "name": name,
            "image": image,
            "artifact_uri": artifact_uri,
            "environment": environment,
        });
        self.post_json(&resource, "/models", &body).await?;
        Ok(())
    }

    async fn create_endpoint(
        &self,
        name: &str,
        model: &str,
        resources: &ResourceRequirements,
    ) -> Result<(), ApiError> {
        let resource = format!("endpoint {}", name);
        let body = json!({
            "name": name,
            "model": model,
            "resources": resources,
        });
        self.post_json(&resource, "/endpoints", &body).await?;
        Ok(())
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription, ApiError> {
        let resource = format!("endpoint {}", name);
        self.get_json(&resource, &format!("/endpoints/{}", name))
            .await
    }

    async fn invoke_endpoint(
        &self,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let resource = format!("endpoint {}", name);
        let response = self
            .post_json(&resource, &format!("/endpoints/{}/invocations", name), payload)
            .await?;
        Ok(response.json().await?)
    }
}
