//! Client (customer) state-sync service.
//!
//! Same pattern as the job service, with one twist: client topics encode a
//! sanitized human-readable name, so records are matched by UUID first and
//! by sanitized name when the payload carries none.

use crate::errors::{ServiceError, ServiceResult};
use crate::sync::broker::{
    self, BrokerSettings, ConnectionState, MessageHandler, MessageKind, TOPIC_ROOT,
};
use crate::sync::models::{ClientRecord, StatusUpdate};
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

const DEFAULT_CLIENT_STATUS: &str = "active";
const CLIENT_ID_PREFIX: &str = "timekeeper_clients_";

fn clients_wildcard() -> String {
    format!("{}/clients/#", TOPIC_ROOT)
}

fn details_topic(uuid: &str) -> String {
    format!("{}/clients/{}/details", TOPIC_ROOT, uuid)
}

/// Lower-cases, strips everything outside `[a-z0-9 ]` and collapses
/// whitespace runs to underscores; the form client names take in topic
/// segments.
pub fn sanitize_topic_name(name: &str) -> String {
    if name.is_empty() {
        return "unknown".to_string();
    }

    let lowered = name.to_lowercase();
    let mut sanitized = String::with_capacity(lowered.len());
    let mut pending_ws = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            pending_ws = true;
            continue;
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() {
            continue;
        }
        if pending_ws {
            sanitized.push('_');
            pending_ws = false;
        }
        sanitized.push(c);
    }
    if pending_ws {
        sanitized.push('_');
    }
    sanitized
}

/// In-memory client cache keyed by UUID with sanitized-name fallback.
#[derive(Default)]
pub(crate) struct ClientCache {
    records: Vec<ClientRecord>,
}

impl ClientCache {
    /// Merge-upserts a `details` payload. Lookup is by UUID first; when
    /// that finds nothing the record whose sanitized name matches the
    /// topic segment is updated in place instead of creating a duplicate.
    /// Status is preserved on merge and defaulted on insert, as for jobs.
    pub(crate) fn apply_details(&mut self, topic_segment: &str, incoming: ClientRecord) {
        let by_uuid = incoming
            .uuid
            .as_deref()
            .and_then(|uuid| self.position_by_uuid(uuid));
        let existing = by_uuid.or_else(|| self.position_by_name(topic_segment));

        match existing {
            Some(index) => {
                let merged = merge_details(&self.records[index], incoming);
                self.records[index] = merged;
            }
            None => {
                let mut record = incoming;
                record.status = Some(DEFAULT_CLIENT_STATUS.to_string());
                self.records.push(record);
            }
        }
    }

    /// Applies a status message, matching by sanitized name against the
    /// topic segment. Unknown clients are dropped.
    pub(crate) fn apply_status(&mut self, topic_segment: &str, update: StatusUpdate) {
        let Some(index) = self.position_by_name(topic_segment) else {
            return;
        };
        if let Some(status) = update.status {
            self.records[index].status = Some(status);
        }
    }

    pub(crate) fn build_update(
        &self,
        uuid: &str,
        patch: &Map<String, Value>,
    ) -> ServiceResult<Value> {
        let index = self
            .position_by_uuid(uuid)
            .ok_or_else(|| ServiceError::not_found("Client", uuid))?;
        let record = &self.records[index];

        let mut value =
            serde_json::to_value(record).map_err(|e| ServiceError::parse(e.to_string()))?;
        let Some(object) = value.as_object_mut() else {
            return Err(ServiceError::internal_error("client record is not an object"));
        };
        for (key, patched) in patch {
            object.insert(key.clone(), patched.clone());
        }
        if let Some(original_uuid) = &record.uuid {
            object.insert("uuid".to_string(), Value::String(original_uuid.clone()));
        }
        Ok(value)
    }

    pub(crate) fn all(&self) -> Vec<ClientRecord> {
        self.records.clone()
    }

    fn position_by_uuid(&self, uuid: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.uuid.as_deref() == Some(uuid))
    }

    /// The topic segment is already in sanitized form, so only the cached
    /// name goes through sanitization before the comparison.
    fn position_by_name(&self, topic_segment: &str) -> Option<usize> {
        self.records.iter().position(|record| {
            record
                .name
                .as_deref()
                .is_some_and(|name| sanitize_topic_name(name) == topic_segment)
        })
    }
}

fn merge_details(existing: &ClientRecord, incoming: ClientRecord) -> ClientRecord {
    let mut extra = existing.extra.clone();
    for (key, value) in incoming.extra {
        extra.insert(key, value);
    }
    ClientRecord {
        uuid: incoming.uuid.or_else(|| existing.uuid.clone()),
        name: incoming.name.or_else(|| existing.name.clone()),
        // Status is owned by the status topic
        status: existing.status.clone(),
        extra,
    }
}

struct ClientMessageHandler {
    cache: Arc<RwLock<ClientCache>>,
}

#[async_trait]
impl MessageHandler for ClientMessageHandler {
    async fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some((name_segment, kind)) = broker::parse_topic(topic) else {
            tracing::debug!("ignoring message on {}", topic);
            return;
        };

        match kind {
            MessageKind::Details => match serde_json::from_slice::<ClientRecord>(payload) {
                Ok(record) => self.cache.write().await.apply_details(name_segment, record),
                Err(e) => tracing::warn!("dropping malformed client details on {}: {}", topic, e),
            },
            MessageKind::Status => match serde_json::from_slice::<StatusUpdate>(payload) {
                Ok(update) => self.cache.write().await.apply_status(name_segment, update),
                Err(e) => tracing::warn!("dropping malformed client status on {}: {}", topic, e),
            },
        }
    }
}

pub struct ClientSyncService {
    client: AsyncClient,
    cache: Arc<RwLock<ClientCache>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    task: JoinHandle<()>,
}

impl ClientSyncService {
    /// Opens the broker connection and starts folding client messages into
    /// the cache.
    pub fn connect(settings: &BrokerSettings) -> Self {
        let (client, eventloop) = broker::open(settings, CLIENT_ID_PREFIX);
        let cache = Arc::new(RwLock::new(ClientCache::default()));
        let state_tx = Arc::new(watch::channel(ConnectionState::Connecting).0);

        let handler = Arc::new(ClientMessageHandler {
            cache: cache.clone(),
        });
        let task = broker::spawn_event_loop(
            eventloop,
            client.clone(),
            clients_wildcard(),
            handler,
            state_tx.clone(),
            settings.reconnect,
        );

        ClientSyncService {
            client,
            cache,
            state_tx,
            task,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connection state transitions as a stream.
    pub fn connection_states(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.state_tx.subscribe())
    }

    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// All client records currently cached.
    pub async fn clients(&self) -> Vec<ClientRecord> {
        self.cache.read().await.all()
    }

    /// Shallow-merges the patch over the cached client and republishes the
    /// full record. Errors when the client is not in the local cache.
    pub async fn update(&self, uuid: &str, patch: Map<String, Value>) -> ServiceResult<()> {
        let payload = self.cache.read().await.build_update(uuid, &patch)?;
        let bytes = serde_json::to_vec(&payload).map_err(|e| ServiceError::parse(e.to_string()))?;

        let topic = details_topic(uuid);
        tracing::debug!("publishing client update to {}", topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(broker::publish_error)
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(payload: Value) -> ClientRecord {
        serde_json::from_value(payload).unwrap()
    }

    #[test]
    fn test_sanitize_topic_name() {
        assert_eq!(sanitize_topic_name("Acme Corp!"), "acme_corp");
        assert_eq!(sanitize_topic_name("North & South Ltd."), "north_south_ltd");
        assert_eq!(sanitize_topic_name("Plain"), "plain");
        assert_eq!(sanitize_topic_name("A  B\tC"), "a_b_c");
        assert_eq!(sanitize_topic_name(""), "unknown");
    }

    #[test]
    fn test_insert_forces_default_status() {
        let mut cache = ClientCache::default();
        cache.apply_details("acme_corp", details(json!({
            "uuid": "c-1",
            "name": "Acme Corp!",
            "status": "archived"
        })));

        let clients = cache.all();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].status.as_deref(), Some("active"));
    }

    #[test]
    fn test_name_fallback_merges_instead_of_duplicating() {
        let mut cache = ClientCache::default();
        cache.apply_details("acme_corp", details(json!({
            "uuid": "c-1",
            "name": "Acme Corp!"
        })));

        // No UUID in the payload; only the topic segment identifies it
        cache.apply_details("acme_corp", details(json!({
            "contact": "jo@acme.example"
        })));

        let clients = cache.all();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].uuid.as_deref(), Some("c-1"));
        assert_eq!(clients[0].extra["contact"], json!("jo@acme.example"));
    }

    #[test]
    fn test_status_matches_by_sanitized_name() {
        let mut cache = ClientCache::default();
        cache.apply_details("acme_corp", details(json!({
            "uuid": "c-1",
            "name": "Acme Corp!"
        })));

        cache.apply_status("acme_corp", StatusUpdate {
            status: Some("inactive".to_string()),
        });
        assert_eq!(cache.all()[0].status.as_deref(), Some("inactive"));

        // A later details merge keeps the status from the status topic
        cache.apply_details("acme_corp", details(json!({
            "uuid": "c-1",
            "status": "active"
        })));
        assert_eq!(cache.all()[0].status.as_deref(), Some("inactive"));
    }

    #[test]
    fn test_multiword_names_match_their_topic_segment() {
        // Segments arrive already sanitized; a cached name whose sanitized
        // form contains underscores must still line up with them.
        let mut cache = ClientCache::default();
        cache.apply_details("north_south_ltd", details(json!({
            "uuid": "c-2",
            "name": "North & South Ltd."
        })));

        cache.apply_details("north_south_ltd", details(json!({
            "contact": "ops@ns.example"
        })));
        cache.apply_status("north_south_ltd", StatusUpdate {
            status: Some("inactive".to_string()),
        });

        let clients = cache.all();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].extra["contact"], json!("ops@ns.example"));
        assert_eq!(clients[0].status.as_deref(), Some("inactive"));
    }

    #[test]
    fn test_status_for_unknown_client_is_dropped() {
        let mut cache = ClientCache::default();
        cache.apply_status("ghost", StatusUpdate {
            status: Some("inactive".to_string()),
        });
        assert!(cache.all().is_empty());
    }

    #[test]
    fn test_build_update_pins_uuid() {
        let mut cache = ClientCache::default();
        cache.apply_details("acme_corp", details(json!({
            "uuid": "c-1",
            "name": "Acme Corp!"
        })));

        let mut patch = Map::new();
        patch.insert("name".to_string(), json!("Acme Corporation"));

        let payload = cache.build_update("c-1", &patch).unwrap();
        assert_eq!(payload["name"], json!("Acme Corporation"));
        assert_eq!(payload["uuid"], json!("c-1"));
        assert_eq!(payload["status"], json!("active"));

        let err = cache.build_update("ghost", &Map::new()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
