//! Run lifecycle notifications.
//!
//! The optimistic `running` view is never persisted; callers that want to
//! render it subscribe to these events.

use serde::Serialize;

use crate::model::TestRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Tests handed to the execution provider, shown as `running`.
    Running { project_id: String, tests: Vec<TestRecord> },
    /// Outcomes persisted.
    Completed {
        project_id: String,
        execution_id: Option<String>,
        tests: Vec<TestRecord>,
    },
    /// The provider failed; `tests` is the blanket-failure view.
    Failed {
        project_id: String,
        reason: String,
        tests: Vec<TestRecord>,
    },
}

impl RunEvent {
    pub fn project_id(&self) -> &str {
        match self {
            RunEvent::Running { project_id, .. }
            | RunEvent::Completed { project_id, .. }
            | RunEvent::Failed { project_id, .. } => project_id,
        }
    }
}
