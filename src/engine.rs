//! Orchestrator - the engine's public surface.
//!
//! Wires a store, a decomposer, and an executor together:
//! 1. `submit` plans a request into a compound task (nothing runs yet)
//! 2. `run` drives it to completion or failure
//! 3. observers and `get_*` reads expose the state to the UI

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, EngineConfig};
use crate::creators::{CreatorSource, DatasetError, JsonFileCreatorSource, MockCreatorSource};
use crate::executor::TaskExecutor;
use crate::handlers::{HandlerRegistry, JitterSource, RandomJitter};
use crate::notify::{Notifier, TracingNotifier};
use crate::planner::{Decomposer, KeywordDecomposer};
use crate::store::{Subscription, TaskNode, TaskStore};
use crate::task::{Task, TaskError, TaskEvent, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<TaskStore>,
    executor: Arc<TaskExecutor>,
    decomposer: Arc<dyn Decomposer>,
}

impl Orchestrator {
    pub fn new(executor: TaskExecutor, decomposer: Arc<dyn Decomposer>) -> Self {
        Self {
            store: Arc::clone(executor.store()),
            executor: Arc::new(executor),
            decomposer,
        }
    }

    /// Build an engine from explicit collaborators.
    pub fn with_parts(
        config: &EngineConfig,
        source: Arc<dyn CreatorSource>,
        notifier: Arc<dyn Notifier>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        let store = Arc::new(TaskStore::with_event_capacity(config.event_capacity));
        let handlers = HandlerRegistry::with_defaults(source, notifier, jitter);
        let executor = TaskExecutor::new(store, handlers).with_delay_scale(config.delay_scale);
        Self::new(executor, Arc::new(KeywordDecomposer))
    }

    /// Build an engine from configuration: dataset from `dataset_path` (or the
    /// built-in one), notifications to the log, jitter seeded if configured.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let source: Arc<dyn CreatorSource> = match &config.dataset_path {
            Some(path) => Arc::new(JsonFileCreatorSource::load(path).await?),
            None => Arc::new(MockCreatorSource::default()),
        };
        let jitter = match config.recommend_seed {
            Some(seed) => RandomJitter::seeded(config.recommend_jitter, seed),
            None => RandomJitter::new(config.recommend_jitter),
        };
        Ok(Self::with_parts(
            config,
            source,
            Arc::new(TracingNotifier),
            Arc::new(jitter),
        ))
    }

    /// Plan `request` into a compound task. Returns the parent id.
    pub fn submit(&self, request: &str) -> Result<TaskId, EngineError> {
        let id = self
            .store
            .create_compound_task(request, self.decomposer.as_ref())?;
        tracing::info!(task_id = %id, "Request submitted: {}", request);
        Ok(id)
    }

    /// Drive a task tree to a terminal state.
    pub async fn run(&self, id: TaskId) {
        self.executor.execute_task(id).await;
    }

    /// Run a task tree on its own tokio task.
    pub fn spawn(&self, id: TaskId) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move { executor.execute_task(id).await })
    }

    /// Drive several unrelated trees concurrently; each tree stays sequential.
    pub async fn run_all(&self, ids: &[TaskId]) {
        join_all(ids.iter().map(|id| self.executor.execute_task(*id))).await;
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[TaskEvent]) + Send + Sync + 'static,
    {
        self.store.on_update(callback)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.store.subscribe_events()
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.store.get_task(id)
    }

    pub fn get_task_tree(&self, id: TaskId) -> Option<TaskNode> {
        self.store.task_tree(id)
    }

    /// Live tasks that are still pending or in progress.
    pub fn get_active_tasks(&self) -> Vec<Task> {
        self.store
            .get_all_tasks()
            .into_iter()
            .filter(|t| t.status().is_active())
            .collect()
    }

    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.store.get_all_tasks()
    }

    pub fn get_history(&self) -> Vec<Task> {
        self.store.get_task_history()
    }

    pub fn clear_completed(&self) -> usize {
        self.store.clear_completed_tasks()
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::FixedJitter;
    use crate::notify::NoopNotifier;
    use crate::task::{TaskStatus, TaskType};
    use std::sync::Mutex;

    fn engine() -> Orchestrator {
        Orchestrator::with_parts(
            &EngineConfig::for_tests(),
            Arc::new(MockCreatorSource::default()),
            Arc::new(NoopNotifier),
            Arc::new(FixedJitter(0.0)),
        )
    }

    fn subtask_types(engine: &Orchestrator, id: TaskId) -> Vec<TaskType> {
        engine
            .get_task(id)
            .unwrap()
            .subtasks()
            .iter()
            .map(|c| engine.get_task(*c).unwrap().task_type())
            .collect()
    }

    #[test]
    fn submit_plans_without_running() {
        let engine = engine();
        let id = engine.submit("xyzzy plugh").unwrap();

        assert_eq!(subtask_types(&engine, id), vec![TaskType::Search]);
        assert_eq!(engine.get_active_tasks().len(), 2);
        assert!(engine.get_history().is_empty());
    }

    #[tokio::test]
    async fn run_reports_events_in_order() {
        let engine = engine();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _sub = engine.subscribe(move |events| {
            let mut log = sink.lock().unwrap();
            for e in events {
                log.push(format!("{}:{}", e.kind(), e.task().task_type()));
            }
        });

        let id = engine.submit("find gaming creators").unwrap();
        engine.run(id).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "created:compound",
                "created:search",
                "started:compound",
                "started:search",
                "completed:search",
                "completed:compound",
            ]
        );
        assert!(engine.get_active_tasks().is_empty());
        assert_eq!(engine.get_history().len(), 2);
    }

    #[tokio::test]
    async fn unrelated_trees_run_concurrently_and_independently() {
        let engine = engine();
        let ok = engine.submit("find beauty creators").unwrap();
        let bad = engine.submit("recommend someone").unwrap();

        engine.run_all(&[ok, bad]).await;

        assert_eq!(engine.get_task(ok).unwrap().status(), TaskStatus::Completed);
        assert_eq!(engine.get_task(bad).unwrap().status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn spawned_run_finishes() {
        let engine = engine();
        let id = engine.submit("search fitness creators with 500k").unwrap();

        engine.spawn(id).await.unwrap();

        let tree = engine.get_task_tree(id).unwrap();
        assert_eq!(tree.task.status(), TaskStatus::Completed);
        let search = tree.children[0].task.result().unwrap().as_array().unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0]["fullName"], "Marcus Johnson");
    }

    #[tokio::test]
    async fn clear_completed_keeps_pending_and_history() {
        let engine = engine();
        let done = engine.submit("find travel creators").unwrap();
        let waiting = engine.submit("find food creators").unwrap();
        engine.run(done).await;

        let history = engine.get_history();
        assert_eq!(engine.clear_completed(), 2);

        assert!(engine.get_task(done).is_none());
        assert_eq!(
            engine.get_task(waiting).unwrap().status(),
            TaskStatus::Pending
        );
        assert_eq!(engine.get_all_tasks().len(), 2);
        assert_eq!(engine.get_history(), history);
    }

    #[tokio::test]
    async fn from_config_uses_builtin_dataset() {
        let engine = Orchestrator::from_config(&EngineConfig::for_tests())
            .await
            .unwrap();
        let id = engine.submit("find tech creators").unwrap();
        engine.run(id).await;
        assert_eq!(
            engine.get_task(id).unwrap().status(),
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn from_config_reports_bad_dataset() {
        let config = EngineConfig {
            dataset_path: Some("/definitely/not/here.json".into()),
            ..EngineConfig::for_tests()
        };
        assert!(matches!(
            Orchestrator::from_config(&config).await,
            Err(EngineError::Dataset(_))
        ));
    }
}
