//! Feature group provisioning flow
//!
//! Create the remote store, submit records, and poll until the data is
//! queryable. Creation is idempotent: an already-existing group is reported
//! and reused, every other error propagates untouched.

use crate::client::{ApiError, FeatureStoreApi};
use crate::core::query::JoinQuery;
use crate::core::record::{FeatureGroupConfig, Record};
use crate::core::state::{QueryStatus, ResourceStatus};
use crate::flows::{emit, EventHandler, FlowEvent, Poller, Readiness};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Drives feature group creation and ingestion
pub struct Provisioner<C> {
    client: C,
    poller: Poller,
    events: Option<EventHandler>,
}

impl<C: FeatureStoreApi> Provisioner<C> {
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

    /// Create the group if needed and wait until it is active
    pub async fn ensure_group(&self, group: &FeatureGroupConfig) -> Result<()> {
        emit(
            &self.events,
            FlowEvent::FeatureGroupCreating {
                name: group.name.clone(),
            },
        );

        match self.client.create_feature_group(group).await {
            Ok(()) => info!("Requested creation of feature group {}", group.name),
            Err(ApiError::Conflict(_)) => {
                info!("Feature group {} already exists", group.name);
                emit(
                    &self.events,
                    FlowEvent::FeatureGroupExists {
                        name: group.name.clone(),
                    },
                );
            }
            Err(e) => return Err(e.into()),
        }

        let resource = format!("feature group {}", group.name);
        let client = &self.client;
        let name = group.name.as_str();
        self.poller
            .wait_for(&resource, || async move {
                let description = client.describe_feature_group(name).await?;
                Ok(match description.status {
                    ResourceStatus::Active => Readiness::Ready,
                    ResourceStatus::Creating => Readiness::Pending,
                    ResourceStatus::CreateFailed | ResourceStatus::Deleting => Readiness::Failed(
                        description
                            .failure_reason
                            .unwrap_or_else(|| format!("status {:?}", description.status)),
                    ),
                })
            })
            .await?;

        emit(
            &self.events,
            FlowEvent::FeatureGroupReady {
                name: group.name.clone(),
            },
        );
        Ok(())
    }

    /// Submit validated records one by one; returns how many were written
    pub async fn ingest(&self, group: &FeatureGroupConfig, records: &[Record]) -> Result<usize> {
        for record in records {
            record.validate_against(group)?;
        }
        for record in records {
            self.client.put_record(&group.name, record).await?;
        }

        info!("Ingested {} record(s) into {}", records.len(), group.name);
        emit(
            &self.events,
            FlowEvent::RecordsIngested {
                group: group.name.clone(),
                count: records.len(),
            },
        );
        Ok(records.len())
    }

    /// Read a JSON-lines file and ingest every record in it
    pub async fn ingest_file(&self, group: &FeatureGroupConfig, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file {}", path.display()))?;

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = Record::from_json_line(group, line).with_context(|| {
                format!("Invalid record at {}:{}", path.display(), lineno + 1)
            })?;
            records.push(record);
        }

        self.ingest(group, &records).await
    }

    /// Poll the online store until a probe record becomes readable
    pub async fn wait_for_record(&self, group: &str, record_id: &str) -> Result<()> {
        let resource = format!("record {} in {}", record_id, group);
        let client = &self.client;
        self.poller
            .wait_for(&resource, || async move {
                Ok(match client.get_record(group, record_id).await? {
                    Some(_) => Readiness::Ready,
                    None => Readiness::Pending,
                })
            })
            .await?;

        emit(
            &self.events,
            FlowEvent::RecordVisible {
                group: group.to_string(),
                record_id: record_id.to_string(),
            },
        );
        Ok(())
    }

    /// Run a join query against the offline store and wait for its result
    pub async fn run_query(
        &self,
        query: &JoinQuery,
        output_location: &str,
    ) -> Result<Option<String>> {
        let sql = query.build();
        let query_id = self.client.start_query(&sql, output_location).await?;
        info!("Started offline query {}", query_id);
        emit(
            &self.events,
            FlowEvent::QueryStarted {
                query_id: query_id.clone(),
            },
        );

        let resource = format!("query {}", query_id);
        let client = &self.client;
        let id = query_id.as_str();
        self.poller
            .wait_for(&resource, || async move {
                let description = client.describe_query(id).await?;
                Ok(match description.status {
                    QueryStatus::Succeeded => Readiness::Ready,
                    QueryStatus::Queued | QueryStatus::Running => Readiness::Pending,
                    QueryStatus::Failed | QueryStatus::Cancelled => Readiness::Failed(
                        description
                            .failure_reason
                            .unwrap_or_else(|| format!("status {:?}", description.status)),
                    ),
                })
            })
            .await?;

        let description = self.client.describe_query(&query_id).await?;
        emit(
            &self.events,
            FlowEvent::QueryCompleted {
                query_id,
                result_location: description.result_location.clone(),
            },
        );
        Ok(description.result_location)
    }
}
