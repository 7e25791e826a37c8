//! Task store - owns every Task record and performs all lifecycle transitions.
//!
//! # Invariants
//! - Every mutation goes through a `TaskStore` method (single writer)
//! - A cascade is applied in full under one lock before anyone is notified
//! - Terminal tasks are archived to an append-only history exactly once
//! - A compound parent completes only when every subtask is completed, and
//!   fails as soon as any subtask fails

mod observers;

pub use observers::Subscription;

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::planner::Decomposer;
use crate::task::{Task, TaskError, TaskEvent, TaskId, TaskStatus, TaskType};
use observers::ObserverList;

/// Default capacity of the async event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A task together with its children, for rendering a whole tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskNode>,
}

#[derive(Default)]
struct StoreState {
    tasks: HashMap<TaskId, Task>,
    /// Creation order of live tasks
    order: Vec<TaskId>,
    /// child -> parent, lookup only
    parents: HashMap<TaskId, TaskId>,
    history: Vec<Task>,
}

impl StoreState {
    fn insert(&mut self, task: Task, parent_id: Option<TaskId>) -> Result<Task, TaskError> {
        if let Some(parent_id) = parent_id {
            let parent = self
                .tasks
                .get_mut(&parent_id)
                .ok_or(TaskError::NotFound(parent_id))?;
            parent.push_subtask(task.id());
            self.parents.insert(task.id(), parent_id);
        }
        self.order.push(task.id());
        self.tasks.insert(task.id(), task.clone());
        Ok(task)
    }

    /// Complete `id` and walk up while every sibling is completed.
    fn complete_cascade(&mut self, id: TaskId, result: Option<Value>, events: &mut Vec<TaskEvent>) {
        let mut current = id;
        let mut result = result;

        loop {
            let Some(task) = self.tasks.get_mut(&current) else {
                tracing::debug!("complete_task: unknown task {}", current);
                return;
            };
            if let Err(e) = task.complete(result) {
                tracing::warn!("Ignoring completion: {}", e);
                return;
            }
            let snapshot = task.clone();
            tracing::info!(task_id = %current, task_type = %snapshot.task_type(), "Task completed");
            self.history.push(snapshot.clone());
            events.push(TaskEvent::Completed { task: snapshot });

            let Some(parent_id) = self.parents.get(&current).copied() else {
                return;
            };
            match self.settled_results(parent_id) {
                Some(results) => {
                    tracing::debug!(parent_id = %parent_id, "All subtasks completed, completing parent");
                    current = parent_id;
                    result = Some(Value::Array(results));
                }
                None => return,
            }
        }
    }

    /// Ordered subtask results if the parent is still open and every subtask
    /// completed. Subtasks without a result are omitted.
    fn settled_results(&self, parent_id: TaskId) -> Option<Vec<Value>> {
        let parent = self.tasks.get(&parent_id)?;
        if parent.is_terminal() {
            return None;
        }
        let mut results = Vec::with_capacity(parent.subtasks().len());
        for child_id in parent.subtasks() {
            let child = self.tasks.get(child_id)?;
            if child.status() != TaskStatus::Completed {
                return None;
            }
            if let Some(result) = child.result() {
                results.push(result.clone());
            }
        }
        Some(results)
    }

    /// Fail `id` and every open ancestor, without waiting for siblings.
    fn fail_cascade(&mut self, id: TaskId, message: String, events: &mut Vec<TaskEvent>) {
        let mut current = id;
        let mut message = message;

        loop {
            let Some(task) = self.tasks.get_mut(&current) else {
                tracing::debug!("fail_task: unknown task {}", current);
                return;
            };
            if let Err(e) = task.fail(message.clone()) {
                tracing::warn!("Ignoring failure: {}", e);
                return;
            }
            let snapshot = task.clone();
            tracing::warn!(task_id = %current, task_type = %snapshot.task_type(), error = %message, "Task failed");
            self.history.push(snapshot.clone());
            events.push(TaskEvent::Failed { task: snapshot });

            let Some(parent_id) = self.parents.get(&current).copied() else {
                return;
            };
            current = parent_id;
            message = format!("Subtask failed: {}", message);
        }
    }

    /// True while some ancestor of `id` can still change state.
    fn has_open_ancestor(&self, id: TaskId) -> bool {
        let mut current = id;
        while let Some(parent_id) = self.parents.get(&current).copied() {
            if self.tasks.get(&parent_id).is_some_and(|p| !p.is_terminal()) {
                return true;
            }
            current = parent_id;
        }
        false
    }

    fn build_node(&self, id: TaskId) -> Option<TaskNode> {
        let task = self.tasks.get(&id)?.clone();
        let children = task
            .subtasks()
            .iter()
            .filter_map(|child| self.build_node(*child))
            .collect();
        Some(TaskNode { task, children })
    }
}

/// In-memory task store with lifecycle cascades and change notifications.
///
/// Construct one per engine and share it as `Arc<TaskStore>`.
pub struct TaskStore {
    state: RwLock<StoreState>,
    observers: ObserverList,
    events_tx: broadcast::Sender<TaskEvent>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            observers: ObserverList::default(),
            events_tx,
        }
    }

    // A panic inside a transition cannot leave a half-applied cascade visible,
    // so a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a batch of events. Must be called with no store lock held.
    fn publish(&self, events: Vec<TaskEvent>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            // No receivers is fine; observers and reads remain the source of truth.
            let _ = self.events_tx.send(event.clone());
        }
        self.observers.notify(&events);
    }

    /// Create a pending task, optionally as the last child of `parent_id`.
    ///
    /// # Errors
    /// Returns `TaskError::NotFound` if `parent_id` does not exist.
    pub fn create_task(
        &self,
        task_type: TaskType,
        description: impl Into<String>,
        parent_id: Option<TaskId>,
    ) -> Result<Task, TaskError> {
        let task = self
            .write()
            .insert(Task::new(task_type, description), parent_id)?;
        tracing::debug!(task_id = %task.id(), task_type = %task_type, "Task created");
        self.publish(vec![TaskEvent::Created { task: task.clone() }]);
        Ok(task)
    }

    /// Create a compound task for `request` and one child per planned step.
    ///
    /// Nothing is started; see [`TaskExecutor`](crate::executor::TaskExecutor).
    /// Parent and children are inserted under one lock, so observers never
    /// see a parent without its plan.
    pub fn create_compound_task(
        &self,
        request: &str,
        decomposer: &dyn Decomposer,
    ) -> Result<TaskId, TaskError> {
        let plan = decomposer.decompose(request);
        let mut events = Vec::with_capacity(plan.len() + 1);

        let parent_id = {
            let mut state = self.write();
            let parent = state.insert(Task::new(TaskType::Compound, request), None)?;
            let parent_id = parent.id();

            let mut children = Vec::with_capacity(plan.len());
            for spec in plan {
                let child = state.insert(Task::new(spec.task_type, spec.description), Some(parent_id))?;
                children.push(TaskEvent::Created { task: child });
            }

            let parent = state.tasks.get(&parent_id).cloned().unwrap_or(parent);
            events.push(TaskEvent::Created { task: parent });
            events.extend(children);
            parent_id
        };

        tracing::info!(
            task_id = %parent_id,
            subtasks = events.len() - 1,
            "Compound task created"
        );
        self.publish(events);
        Ok(parent_id)
    }

    /// Move a pending task to in-progress. Unknown ids are ignored.
    pub fn start_task(&self, id: TaskId) {
        let event = {
            let mut state = self.write();
            let Some(task) = state.tasks.get_mut(&id) else {
                tracing::debug!("start_task: unknown task {}", id);
                return;
            };
            if let Err(e) = task.start() {
                tracing::warn!("Ignoring start: {}", e);
                return;
            }
            TaskEvent::Started { task: task.clone() }
        };
        tracing::info!(task_id = %id, task_type = %event.task().task_type(), "Task started");
        self.publish(vec![event]);
    }

    /// Complete a task and cascade completion to parents whose subtasks are
    /// now all completed.
    pub fn complete_task(&self, id: TaskId, result: Option<Value>) {
        let mut events = Vec::new();
        self.write().complete_cascade(id, result, &mut events);
        self.publish(events);
    }

    /// Fail a task and immediately fail its whole ancestor chain.
    pub fn fail_task(&self, id: TaskId, message: impl Into<String>) {
        let mut events = Vec::new();
        self.write().fail_cascade(id, message.into(), &mut events);
        self.publish(events);
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.read().tasks.get(&id).cloned()
    }

    /// All live tasks in creation order.
    pub fn get_all_tasks(&self) -> Vec<Task> {
        let state = self.read();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// Snapshots of every task that reached a terminal state, oldest first.
    pub fn get_task_history(&self) -> Vec<Task> {
        self.read().history.clone()
    }

    pub fn parent_of(&self, id: TaskId) -> Option<TaskId> {
        self.read().parents.get(&id).copied()
    }

    /// The task and its descendants, children in creation order.
    pub fn task_tree(&self, id: TaskId) -> Option<TaskNode> {
        self.read().build_node(id)
    }

    /// Remove every completed or failed task from the live store.
    ///
    /// Terminal subtasks of a still-open ancestor stay: the parent's cascade
    /// and its remaining siblings' input depend on them. History is untouched.
    /// Returns how many tasks were removed.
    pub fn clear_completed_tasks(&self) -> usize {
        let mut state = self.write();
        let removable: HashSet<TaskId> = state
            .tasks
            .values()
            .filter(|task| task.is_terminal() && !state.has_open_ancestor(task.id()))
            .map(Task::id)
            .collect();

        let StoreState {
            tasks,
            order,
            parents,
            ..
        } = &mut *state;

        tasks.retain(|id, _| !removable.contains(id));
        order.retain(|id| tasks.contains_key(id));
        parents.retain(|child, parent| tasks.contains_key(child) && tasks.contains_key(parent));

        let removed = removable.len();
        tracing::info!(removed, remaining = tasks.len(), "Cleared terminal tasks");
        removed
    }

    /// Register an observer called synchronously after every create, start,
    /// complete, and fail call with the events that call produced.
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[TaskEvent]) + Send + Sync + 'static,
    {
        self.observers.register(callback)
    }

    /// Receive every event asynchronously.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.events_tx.subscribe()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
