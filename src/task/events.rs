use serde::{Deserialize, Serialize};

use super::{Task, TaskId};

/// Lifecycle events published by the task store.
///
/// Each event carries a snapshot of the task taken right after the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Task was created (pending).
    Created { task: Task },
    /// Task moved to in-progress.
    Started { task: Task },
    /// Task completed with its result.
    Completed { task: Task },
    /// Task failed with its error.
    Failed { task: Task },
}

impl TaskEvent {
    pub fn task(&self) -> &Task {
        match self {
            Self::Created { task }
            | Self::Started { task }
            | Self::Completed { task }
            | Self::Failed { task } => task,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task().id()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Started { .. } => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
