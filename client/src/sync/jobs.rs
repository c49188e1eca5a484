//! Job state-sync service.
//!
//! Subscribes to the job topic hierarchy, folds `details` and `status`
//! messages into an in-memory cache and exposes the "my jobs" and "all
//! jobs" derived views. Local edits go back out on the per-job details
//! topic.

use crate::errors::{ServiceError, ServiceResult};
use crate::sync::broker::{
    self, BrokerSettings, ConnectionState, MessageHandler, MessageKind, TOPIC_ROOT,
};
use crate::sync::models::{JobRecord, JobSummary, StatusUpdate};
use crate::utils::uuid_format::uuid_matches;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

const DEFAULT_JOB_STATUS: &str = "pending";
const CLIENT_ID_PREFIX: &str = "timekeeper_jobs_";

fn jobs_wildcard() -> String {
    format!("{}/jobs/#", TOPIC_ROOT)
}

fn details_topic(uuid: &str) -> String {
    format!("{}/jobs/{}/details", TOPIC_ROOT, uuid)
}

/// In-memory job cache. Exactly one job-level record per UUID.
#[derive(Default)]
pub(crate) struct JobCache {
    records: Vec<JobRecord>,
}

impl JobCache {
    /// Merge-upserts a `details` payload by UUID.
    ///
    /// Existing records take the new fields shallowly, except `status`:
    /// status only travels via the dedicated status topic, so the value a
    /// details payload happens to carry never overwrites it. Unseen UUIDs
    /// are inserted with the default status regardless of the payload.
    pub(crate) fn apply_details(&mut self, incoming: JobRecord) {
        let existing = incoming
            .uuid
            .as_deref()
            .and_then(|uuid| self.position(uuid));

        match existing {
            Some(index) => {
                let merged = merge_details(&self.records[index], incoming);
                self.records[index] = merged;
            }
            None => {
                let mut record = incoming;
                record.status = Some(DEFAULT_JOB_STATUS.to_string());
                self.records.push(record);
            }
        }
    }

    /// Applies a dedicated status message. Unknown UUIDs are dropped.
    pub(crate) fn apply_status(&mut self, uuid: &str, update: StatusUpdate) {
        let Some(index) = self.position(uuid) else {
            return;
        };
        if let Some(status) = update.status {
            self.records[index].status = Some(status);
        }
    }

    /// Builds the full record to republish for a local edit: the patch
    /// shallow-merged over the cached record, UUID pinned to the original.
    pub(crate) fn build_update(
        &self,
        uuid: &str,
        patch: &Map<String, Value>,
    ) -> ServiceResult<Value> {
        let index = self
            .position(uuid)
            .ok_or_else(|| ServiceError::not_found("Job", uuid))?;
        let record = &self.records[index];

        let mut value =
            serde_json::to_value(record).map_err(|e| ServiceError::parse(e.to_string()))?;
        let Some(object) = value.as_object_mut() else {
            return Err(ServiceError::internal_error("job record is not an object"));
        };
        for (key, patched) in patch {
            object.insert(key.clone(), patched.clone());
        }
        if let Some(original_uuid) = &record.uuid {
            object.insert("uuid".to_string(), Value::String(original_uuid.clone()));
        }
        Ok(value)
    }

    /// Jobs assigned to the given staff identifier, matched canonically
    /// across hyphenation and case.
    pub(crate) fn assigned_to(&self, staff_uuid: &str) -> Vec<JobSummary> {
        self.records
            .iter()
            .filter(|record| {
                record
                    .assigned_staff
                    .iter()
                    .flatten()
                    .any(|staff| {
                        staff
                            .uuid
                            .as_deref()
                            .is_some_and(|uuid| uuid_matches(uuid, staff_uuid))
                    })
            })
            .map(JobSummary::from_record)
            .collect()
    }

    /// Job-level records only: task- and staff-level sub-records sharing
    /// the stream are excluded, as are records missing required fields.
    pub(crate) fn job_level(&self) -> Vec<JobSummary> {
        self.records
            .iter()
            .filter(|record| {
                record.uuid.is_some()
                    && record.job_id.is_some()
                    && record.name.is_some()
                    && record.task_id.is_none()
                    && record.staff_id.is_none()
            })
            .map(JobSummary::from_record)
            .collect()
    }

    fn position(&self, uuid: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.uuid.as_deref() == Some(uuid))
    }
}

fn merge_details(existing: &JobRecord, incoming: JobRecord) -> JobRecord {
    let mut extra = existing.extra.clone();
    for (key, value) in incoming.extra {
        extra.insert(key, value);
    }
    JobRecord {
        uuid: incoming.uuid.or_else(|| existing.uuid.clone()),
        job_id: incoming.job_id.or_else(|| existing.job_id.clone()),
        name: incoming.name.or_else(|| existing.name.clone()),
        client: incoming.client.or_else(|| existing.client.clone()),
        // Status is owned by the status topic
        status: existing.status.clone(),
        due_date: incoming.due_date.or_else(|| existing.due_date.clone()),
        task_id: incoming.task_id.or_else(|| existing.task_id.clone()),
        staff_id: incoming.staff_id.or_else(|| existing.staff_id.clone()),
        assigned_staff: incoming
            .assigned_staff
            .or_else(|| existing.assigned_staff.clone()),
        extra,
    }
}

struct JobMessageHandler {
    cache: Arc<RwLock<JobCache>>,
}

#[async_trait]
impl MessageHandler for JobMessageHandler {
    async fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some((id_segment, kind)) = broker::parse_topic(topic) else {
            tracing::debug!("ignoring message on {}", topic);
            return;
        };

        match kind {
            MessageKind::Details => match serde_json::from_slice::<JobRecord>(payload) {
                Ok(record) => self.cache.write().await.apply_details(record),
                Err(e) => tracing::warn!("dropping malformed job details on {}: {}", topic, e),
            },
            MessageKind::Status => match serde_json::from_slice::<StatusUpdate>(payload) {
                Ok(update) => self.cache.write().await.apply_status(id_segment, update),
                Err(e) => tracing::warn!("dropping malformed job status on {}: {}", topic, e),
            },
        }
    }
}

/// Read handle over the "my jobs" view.
///
/// The staff identifier is captured when the view is created and is not
/// re-read if the session changes afterwards.
pub struct MyJobsView {
    cache: Arc<RwLock<JobCache>>,
    staff_uuid: String,
}

impl MyJobsView {
    pub async fn get(&self) -> Vec<JobSummary> {
        self.cache.read().await.assigned_to(&self.staff_uuid)
    }
}

pub struct JobSyncService {
    client: AsyncClient,
    cache: Arc<RwLock<JobCache>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    task: JoinHandle<()>,
}

impl JobSyncService {
    /// Opens the broker connection and starts folding job messages into
    /// the cache. The connection is established in the background; track
    /// progress through [`JobSyncService::connection_state`].
    pub fn connect(settings: &BrokerSettings) -> Self {
        let (client, eventloop) = broker::open(settings, CLIENT_ID_PREFIX);
        let cache = Arc::new(RwLock::new(JobCache::default()));
        let state_tx = Arc::new(watch::channel(ConnectionState::Connecting).0);

        let handler = Arc::new(JobMessageHandler {
            cache: cache.clone(),
        });
        let task = broker::spawn_event_loop(
            eventloop,
            client.clone(),
            jobs_wildcard(),
            handler,
            state_tx.clone(),
            settings.reconnect,
        );

        JobSyncService {
            client,
            cache,
            state_tx,
            task,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connection state transitions as a stream, for observers that react
    /// to connect/disconnect instead of polling.
    pub fn connection_states(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Shallow-merges the patch over the cached job and republishes the
    /// full record. Errors when the job is not in the local cache; does
    /// not wait for any acknowledgment beyond the publish itself.
    pub async fn update(&self, uuid: &str, patch: Map<String, Value>) -> ServiceResult<()> {
        let payload = self.cache.read().await.build_update(uuid, &patch)?;
        let bytes = serde_json::to_vec(&payload).map_err(|e| ServiceError::parse(e.to_string()))?;

        let topic = details_topic(uuid);
        tracing::debug!("publishing job update to {}", topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(broker::publish_error)
    }

    /// Creates a "my jobs" view for the given staff identifier.
    pub fn my_jobs(&self, staff_uuid: impl Into<String>) -> MyJobsView {
        MyJobsView {
            cache: self.cache.clone(),
            staff_uuid: staff_uuid.into(),
        }
    }

    /// All job-level records currently cached.
    pub async fn all_jobs(&self) -> Vec<JobSummary> {
        self.cache.read().await.job_level()
    }

    /// Closes the broker connection. Idempotent.
    pub async fn disconnect(&self) {
        if *self.state_tx.borrow() == ConnectionState::Disconnected {
            return;
        }
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!("broker disconnect: {}", e);
        }
        self.task.abort();
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}
