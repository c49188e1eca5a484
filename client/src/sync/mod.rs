//! Broker-fed state synchronization services.
//!
//! Each service owns one persistent MQTT-over-WebSocket connection,
//! subscribes to its entity's wildcard topic and folds streamed partial
//! updates into an in-memory cache. Local edits are republished to the
//! per-entity details topic; there is no acknowledgment wait, no
//! deduplication and no ordering guarantee beyond last-write-wins.

pub mod broker;
pub mod clients;
pub mod jobs;
pub mod models;

pub use broker::{BrokerSettings, ConnectionState};
pub use clients::ClientSyncService;
pub use jobs::{JobSyncService, MyJobsView};
