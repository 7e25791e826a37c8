//! Planned subtasks, before they become live Task records.

use serde::{Deserialize, Serialize};

use super::TaskType;

/// A planned subtask produced by a [`Decomposer`](crate::planner::Decomposer).
///
/// # Purpose
/// Represents one step of a plan before the store allocates an id for it.
/// The position of a spec in its plan is its execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    #[serde(rename = "type")]
    pub task_type: TaskType,

    /// Label shown for the step
    pub description: String,
}

impl SubtaskSpec {
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            task_type,
            description: description.into(),
        }
    }
}
