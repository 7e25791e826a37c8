//! Core Task record and its lifecycle state machine.
//!
//! # Invariants
//! - `id` is unique within a store
//! - `status` only moves forward: `Pending -> InProgress -> {Completed, Failed}`
//! - `result` is present only when `status == Completed`
//! - `error` is present only when `status == Failed`
//! - `subtasks` is fixed once the compound parent has been planned

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a task.
///
/// # Properties
/// - Globally unique within an execution context
/// - Immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a task performs.
///
/// Every type except `Compound` is executed by a handler; `Compound` tasks
/// only aggregate their subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Search,
    Filter,
    Recommend,
    Contact,
    Analyze,
    Select,
    Compound,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Filter => "filter",
            Self::Recommend => "recommend",
            Self::Contact => "contact",
            Self::Analyze => "analyze",
            Self::Select => "select",
            Self::Compound => "compound",
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "filter" => Ok(Self::Filter),
            "recommend" => Ok(Self::Recommend),
            "contact" => Ok(Self::Contact),
            "analyze" => Ok(Self::Analyze),
            "select" => Ok(Self::Select),
            "compound" => Ok(Self::Compound),
            other => Err(TaskError::UnknownTaskType(other.to_string())),
        }
    }
}

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Pending -> InProgress -> Completed
///                      \-> Failed
/// ```
/// A compound task may also jump from `Pending` straight to a terminal state
/// when a cascade reaches it before it was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `true` if the task is Completed or Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `true` if the task is Pending or InProgress.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of work tracked by the [`TaskStore`](crate::store::TaskStore).
///
/// Fields are private; only the store drives state transitions, which keeps
/// the result/error invariants in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: TaskId,
    #[serde(rename = "type")]
    task_type: TaskType,
    description: String,
    status: TaskStatus,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    subtasks: Vec<TaskId>,
}

impl Task {
    /// Create a pending task.
    ///
    /// # Postconditions
    /// - `status == Pending`, no result, no error, no subtasks
    /// - `created == updated`
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            task_type,
            description: description.into(),
            status: TaskStatus::Pending,
            created: now,
            updated: now,
            result: None,
            error: None,
            subtasks: Vec::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Child task IDs in creation (and execution) order.
    pub fn subtasks(&self) -> &[TaskId] {
        &self.subtasks
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn push_subtask(&mut self, child: TaskId) {
        self.subtasks.push(child);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated = Utc::now();
    }

    /// Transition to InProgress.
    ///
    /// # Errors
    /// Returns `Err` unless the task is Pending.
    pub(crate) fn start(&mut self) -> Result<(), TaskError> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::InProgress;
                self.touch();
                Ok(())
            }
            other => Err(TaskError::InvalidTransition {
                id: self.id,
                from: other,
                to: TaskStatus::InProgress,
            }),
        }
    }

    /// Transition to Completed, storing `result`.
    ///
    /// # Errors
    /// Returns `Err` if the task is already terminal.
    pub(crate) fn complete(&mut self, result: Option<Value>) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: TaskStatus::Completed,
            });
        }
        self.status = TaskStatus::Completed;
        self.result = result;
        self.touch();
        Ok(())
    }

    /// Transition to Failed, storing `message`.
    ///
    /// # Errors
    /// Returns `Err` if the task is already terminal.
    pub(crate) fn fail(&mut self, message: String) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: TaskStatus::Failed,
            });
        }
        self.status = TaskStatus::Failed;
        self.error = Some(message);
        self.touch();
        Ok(())
    }
}

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid state transition for task {id} from {from} to {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
}
