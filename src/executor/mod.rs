//! Task executor - drives tasks from pending to a terminal state.
//!
//! # Execution Flow
//! ```text
//! execute_task(id)
//!   start_task(id)
//!   compound? -> for each subtask in creation order:
//!                  execute_task(child); stop at the first failure
//!   leaf?     -> resolve input, wait the handler delay, run the handler
//!                  Ok(value) -> complete_task
//!                  Err(e)    -> fail_task
//! ```
//! The executor never sets a compound task's terminal status itself; that
//! comes from the store's cascade.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_recursion::async_recursion;
use futures::FutureExt;
use serde_json::Value;

use crate::handlers::{HandlerContext, HandlerError, HandlerRegistry};
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskStatus};

pub struct TaskExecutor {
    store: Arc<TaskStore>,
    handlers: HandlerRegistry,
    delay_scale: f64,
}

impl TaskExecutor {
    pub fn new(store: Arc<TaskStore>, handlers: HandlerRegistry) -> Self {
        Self {
            store,
            handlers,
            delay_scale: 1.0,
        }
    }

    /// Scale handler delays; `0.0` runs handlers back to back.
    pub fn with_delay_scale(mut self, scale: f64) -> Self {
        self.delay_scale = scale.max(0.0);
        self
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Run a task to a terminal state.
    ///
    /// # Preconditions
    /// - The task is not terminal (terminal tasks are skipped with a warning)
    ///
    /// Unknown ids are logged and ignored. Handler errors never escape; they
    /// become `fail_task` calls.
    #[async_recursion]
    pub async fn execute_task(&self, id: TaskId) {
        let Some(task) = self.store.get_task(id) else {
            tracing::warn!("execute_task: task {} not found", id);
            return;
        };
        if task.is_terminal() {
            tracing::warn!(task_id = %id, status = %task.status(), "execute_task: task already finished");
            return;
        }

        self.store.start_task(id);

        if task.task_type().is_compound() {
            self.execute_compound_task(&task).await;
            return;
        }

        match self.run_handler(&task).await {
            Ok(result) => self.store.complete_task(id, Some(result)),
            Err(e) => self.store.fail_task(id, e.to_string()),
        }
    }

    /// Run subtasks strictly in creation order, stopping at the first failure.
    ///
    /// Subtasks after a failure stay pending.
    pub async fn execute_compound_task(&self, task: &Task) {
        if task.subtasks().is_empty() {
            tracing::debug!(task_id = %task.id(), "Compound task has no subtasks");
            self.store.complete_task(task.id(), Some(Value::Array(Vec::new())));
            return;
        }

        for (index, child) in task.subtasks().iter().enumerate() {
            self.execute_task(*child).await;

            let status = self.store.get_task(*child).map(|t| t.status());
            if status == Some(TaskStatus::Failed) {
                tracing::info!(
                    task_id = %task.id(),
                    failed_step = index,
                    skipped = task.subtasks().len() - index - 1,
                    "Stopping compound task after failed subtask"
                );
                break;
            }
        }
    }

    /// Upstream input for a task.
    ///
    /// - No parent: `None`
    /// - Parent has a result: that result
    /// - Otherwise: the result of the first completed sibling, in creation order
    pub fn resolve_input(&self, task: &Task) -> Option<Value> {
        let parent = self.store.get_task(self.store.parent_of(task.id())?)?;
        if let Some(result) = parent.result() {
            return Some(result.clone());
        }

        parent
            .subtasks()
            .iter()
            .filter(|id| **id != task.id())
            .filter_map(|id| self.store.get_task(*id))
            .find(|sibling| sibling.status() == TaskStatus::Completed && sibling.result().is_some())
            .and_then(|sibling| sibling.result().cloned())
    }

    /// The task's description followed by its ancestors' descriptions.
    fn criteria_text(&self, task: &Task) -> String {
        let mut parts = vec![task.description().to_string()];
        let mut current = task.id();
        while let Some(parent_id) = self.store.parent_of(current) {
            if let Some(parent) = self.store.get_task(parent_id) {
                parts.push(parent.description().to_string());
            }
            current = parent_id;
        }
        parts.join(" ")
    }

    async fn run_handler(&self, task: &Task) -> Result<Value, HandlerError> {
        let handler = self
            .handlers
            .get(task.task_type())
            .ok_or(HandlerError::NoHandler(task.task_type()))?;

        let ctx = HandlerContext::new(task, &self.criteria_text(task), self.resolve_input(task));
        tracing::debug!(
            task_id = %task.id(),
            task_type = %task.task_type(),
            has_input = ctx.input.is_some(),
            "Dispatching to handler"
        );

        let delay = handler.delay().mul_f64(self.delay_scale);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(task_id = %task.id(), "Handler panicked: {}", message);
                Err(HandlerError::Panicked(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creators::{Creator, MockCreatorSource};
    use crate::handlers::{FixedJitter, TaskHandler};
    use crate::notify::{Notification, Notifier};
    use crate::planner::KeywordDecomposer;
    use crate::task::TaskType;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Notification>>);

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }

    struct Failing(TaskType);

    #[async_trait]
    impl TaskHandler for Failing {
        fn task_type(&self) -> TaskType {
            self.0
        }
        fn delay(&self) -> Duration {
            Duration::ZERO
        }
        async fn handle(&self, _ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
            Err(HandlerError::MissingSearchResults)
        }
    }

    struct Panicking;

    #[async_trait]
    impl TaskHandler for Panicking {
        fn task_type(&self) -> TaskType {
            TaskType::Analyze
        }
        fn delay(&self) -> Duration {
            Duration::ZERO
        }
        async fn handle(&self, _ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
            panic!("dataset exploded")
        }
    }

    fn setup(source: MockCreatorSource) -> (Arc<TaskStore>, TaskExecutor, Arc<Recorder>) {
        let store = Arc::new(TaskStore::new());
        let recorder = Arc::new(Recorder::default());
        let handlers = HandlerRegistry::with_defaults(
            Arc::new(source),
            recorder.clone(),
            Arc::new(FixedJitter(0.0)),
        );
        let executor = TaskExecutor::new(Arc::clone(&store), handlers).with_delay_scale(0.0);
        (store, executor, recorder)
    }

    fn children(store: &TaskStore, id: TaskId) -> Vec<Task> {
        store
            .get_task(id)
            .unwrap()
            .subtasks()
            .iter()
            .map(|c| store.get_task(*c).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn compound_request_runs_to_completion() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let id = store
            .create_compound_task("find me tech creators with high engagement", &KeywordDecomposer)
            .unwrap();

        executor.execute_task(id).await;

        let parent = store.get_task(id).unwrap();
        assert_eq!(parent.status(), TaskStatus::Completed);
        let steps = children(&store, id);
        assert!(steps.iter().all(|t| t.status() == TaskStatus::Completed));

        let expected: Vec<Value> = steps.iter().map(|t| t.result().unwrap().clone()).collect();
        assert_eq!(parent.result(), Some(&Value::Array(expected)));

        // tech + high engagement: only Priya Nair (0.054) in the built-in set
        let search = steps[0].result().unwrap().as_array().unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0]["id"], "c6");
    }

    #[tokio::test]
    async fn nested_compounds_complete_bottom_up() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let root = store
            .create_task(TaskType::Compound, "find gaming creators", None)
            .unwrap();
        let mid = store
            .create_task(TaskType::Compound, "nested plan", Some(root.id()))
            .unwrap();
        let leaf = store
            .create_task(TaskType::Search, "step", Some(mid.id()))
            .unwrap();

        executor.execute_task(root.id()).await;

        let leaf = store.get_task(leaf.id()).unwrap();
        assert_eq!(leaf.status(), TaskStatus::Completed);
        let ids: Vec<&str> = leaf
            .result()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c1", "c3", "c9"]);

        let leaf_result = leaf.result().unwrap().clone();
        let mid = store.get_task(mid.id()).unwrap();
        assert_eq!(mid.status(), TaskStatus::Completed);
        assert_eq!(mid.result(), Some(&json!([leaf_result.clone()])));

        let root = store.get_task(root.id()).unwrap();
        assert_eq!(root.status(), TaskStatus::Completed);
        assert_eq!(root.result(), Some(&json!([[leaf_result]])));
    }

    #[tokio::test]
    async fn filter_failure_leaves_contact_pending() {
        let (store, _, _) = setup(MockCreatorSource::default());
        let mut handlers = HandlerRegistry::with_defaults(
            Arc::new(MockCreatorSource::default()),
            Arc::new(Recorder::default()),
            Arc::new(FixedJitter(0.0)),
        );
        handlers.register(Arc::new(Failing(TaskType::Filter)));
        let executor = TaskExecutor::new(Arc::clone(&store), handlers).with_delay_scale(0.0);

        let id = store
            .create_compound_task("find top tech creators and send them messages", &KeywordDecomposer)
            .unwrap();
        executor.execute_task(id).await;

        let steps = children(&store, id);
        let types: Vec<TaskType> = steps.iter().map(|t| t.task_type()).collect();
        assert_eq!(types, vec![TaskType::Search, TaskType::Filter, TaskType::Contact]);
        assert_eq!(steps[0].status(), TaskStatus::Completed);
        assert_eq!(steps[1].status(), TaskStatus::Failed);
        assert_eq!(steps[2].status(), TaskStatus::Pending);

        let parent = store.get_task(id).unwrap();
        assert_eq!(parent.status(), TaskStatus::Failed);
        assert_eq!(
            parent.error(),
            Some("Subtask failed: No valid search results found from previous task")
        );
    }

    #[tokio::test]
    async fn empty_search_makes_contact_fail_without_upsell() {
        let (store, executor, recorder) = setup(MockCreatorSource::new(vec![Creator::new(
            "x", "X", 10, 0.01, &["food"],
        )]));
        let id = store
            .create_compound_task("search gaming creators and contact them", &KeywordDecomposer)
            .unwrap();

        executor.execute_task(id).await;

        let steps = children(&store, id);
        assert_eq!(steps[0].result(), Some(&json!([])));
        assert_eq!(steps[1].status(), TaskStatus::Failed);
        assert_eq!(
            steps[1].error(),
            Some("No creators to contact from previous tasks")
        );
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn contact_reads_first_completed_sibling() {
        let (store, executor, recorder) = setup(MockCreatorSource::default());
        let id = store
            .create_compound_task("find top tech creators and send them messages", &KeywordDecomposer)
            .unwrap();

        executor.execute_task(id).await;

        let steps = children(&store, id);
        assert!(steps.iter().all(|t| t.status() == TaskStatus::Completed));
        // search (not filter) output feeds contact: c1, c6, c9 in dataset order
        let contacted: Vec<&str> = steps[2]
            .result()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["creatorId"].as_str().unwrap())
            .collect();
        assert_eq!(contacted, vec!["c1", "c6", "c9"]);
        // filter sorted the same creators by engagement
        let filtered: Vec<&str> = steps[1]
            .result()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(filtered, vec!["c6", "c9", "c1"]);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recommend_without_upstream_fails() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let id = store
            .create_compound_task("recommend me some beauty influencers", &KeywordDecomposer)
            .unwrap();

        executor.execute_task(id).await;

        let parent = store.get_task(id).unwrap();
        assert_eq!(parent.status(), TaskStatus::Failed);
        assert_eq!(
            parent.error(),
            Some("Subtask failed: No candidates for recommendations from previous tasks")
        );
    }

    #[tokio::test]
    async fn empty_compound_completes_with_empty_list() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let task = store.create_task(TaskType::Compound, "nothing", None).unwrap();

        executor.execute_task(task.id()).await;

        let task = store.get_task(task.id()).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some(&json!([])));
    }

    #[tokio::test]
    async fn unknown_and_terminal_ids_are_ignored() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        executor.execute_task(TaskId::new()).await;
        assert!(store.get_all_tasks().is_empty());

        let task = store.create_task(TaskType::Select, "pick", None).unwrap();
        store.fail_task(task.id(), "already");
        executor.execute_task(task.id()).await;
        assert_eq!(store.get_task(task.id()).unwrap().error(), Some("already"));
    }

    #[tokio::test]
    async fn missing_handler_fails_task() {
        let store = Arc::new(TaskStore::new());
        let executor = TaskExecutor::new(Arc::clone(&store), HandlerRegistry::new());
        let task = store.create_task(TaskType::Search, "find", None).unwrap();

        executor.execute_task(task.id()).await;

        assert_eq!(
            store.get_task(task.id()).unwrap().error(),
            Some("No handler registered for task type: search")
        );
    }

    #[tokio::test]
    async fn handler_panic_becomes_failure() {
        let store = Arc::new(TaskStore::new());
        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(Panicking));
        let executor = TaskExecutor::new(Arc::clone(&store), handlers);
        let task = store.create_task(TaskType::Analyze, "analyze", None).unwrap();

        executor.execute_task(task.id()).await;

        let task = store.get_task(task.id()).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("Handler panicked: dataset exploded"));
    }

    #[tokio::test]
    async fn resolve_input_prefers_parent_result() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let parent = store.create_task(TaskType::Compound, "p", None).unwrap();
        let first = store
            .create_task(TaskType::Search, "a", Some(parent.id()))
            .unwrap();
        let second = store
            .create_task(TaskType::Select, "b", Some(parent.id()))
            .unwrap();

        assert_eq!(executor.resolve_input(&parent), None);
        assert_eq!(executor.resolve_input(&second), None);

        store.complete_task(first.id(), Some(json!(["from-first"])));
        assert_eq!(executor.resolve_input(&second), Some(json!(["from-first"])));

        store.complete_task(second.id(), Some(json!(["from-second"])));
        assert_eq!(
            executor.resolve_input(&first),
            Some(json!([["from-first"], ["from-second"]]))
        );
    }

    #[tokio::test]
    async fn criteria_include_ancestor_descriptions() {
        let (store, executor, _) = setup(MockCreatorSource::default());
        let parent = store
            .create_task(TaskType::Compound, "Gaming with 1M", None)
            .unwrap();
        let child = store
            .create_task(TaskType::Search, "Search step", Some(parent.id()))
            .unwrap();

        assert_eq!(executor.criteria_text(&child), "Search step Gaming with 1M");
    }
}
