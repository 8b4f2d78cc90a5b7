use super::{JobId, JobKind};
use serde::Deserialize;

pub const TASK_UPDATE_EVENT: &str = "background-task-update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// Payload of [`TASK_UPDATE_EVENT`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionUpdate {
    pub task_id: String,
    #[serde(default)]
    pub result_id: Option<String>,
    pub result_type: String,
    pub status: UpdateStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What an observed notification means for the awaited job.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Progress(Option<f64>),
    Completed,
    Failed(Option<String>),
}

impl CompletionUpdate {
    /// The platform reports its own task id in `taskId` and the generated
    /// resource in `resultId`; either may be what the caller waits on.
    pub fn concerns(&self, id: &JobId, kind: JobKind) -> bool {
        let id_matches =
            self.task_id == id.as_str() || self.result_id.as_deref() == Some(id.as_str());
        id_matches && self.result_type == kind.tag()
    }

    pub fn signal(&self) -> Option<Signal> {
        match self.status {
            UpdateStatus::Processing => Some(Signal::Progress(self.progress)),
            UpdateStatus::Completed => Some(Signal::Completed),
            UpdateStatus::Failed => Some(Signal::Failed(self.error.clone())),
            UpdateStatus::Other => None,
        }
    }
}

/// Payload of the per-resource status event, see [`resource_status_event`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResourceStatus {
    pub fn signal(&self) -> Option<Signal> {
        match self.status.as_str() {
            "generated" | "completed" => Some(Signal::Completed),
            "failed" => Some(Signal::Failed(self.error.clone())),
            _ => None,
        }
    }
}

pub fn resource_status_event(id: &JobId) -> String {
    format!("/ingredients/{id}/status")
}
