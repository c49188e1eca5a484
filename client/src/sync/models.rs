//! Record shapes carried on the broker topics.
//!
//! Known fields are typed; everything else rides in the flattened `extra`
//! map so shallow merges cover arbitrary detail fields without losing data
//! on republish.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job-stream record. Task- and staff-level sub-records share the same
/// stream and are distinguished by their `task_id` / `staff_id` markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<Vec<StaffAssignment>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a job's assigned-staff list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Job-level projection served by the derived views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub uuid: Option<String>,
    pub job_number: Option<Value>,
    pub client: Option<Value>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<Value>,
}

impl JobSummary {
    pub(crate) fn from_record(record: &JobRecord) -> Self {
        JobSummary {
            uuid: record.uuid.clone(),
            job_number: record.job_id.clone(),
            client: record.client.clone(),
            name: record.name.clone(),
            status: record.status.clone(),
            due_date: record.due_date.clone(),
        }
    }
}

/// A client/customer record. UUID is the primary key; the sanitized name
/// is the fallback when a message carries none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a dedicated status message.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
}
