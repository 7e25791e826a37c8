//! Type handlers - the per-type units of work behind each task.
//!
//! A handler receives the task, the lowercased criteria text (the task's
//! description followed by its ancestors'), and the resolved upstream input.
//! It returns the task's result or a [`HandlerError`]; the executor turns
//! either into a store transition.
//!
//! | Type      | Input                 | Fails when                  |
//! |-----------|-----------------------|-----------------------------|
//! | search    | none                  | never                       |
//! | filter    | list of creators      | input missing or not a list |
//! | recommend | non-empty creators    | input missing or empty      |
//! | contact   | non-empty creators    | input missing or empty      |
//! | analyze   | creators, optional    | never                       |
//! | select    | non-empty list        | input missing or empty      |

mod analyze;
mod contact;
pub mod criteria;
mod filter;
mod recommend;
mod search;
mod select;

pub use analyze::AnalyzeHandler;
pub use contact::{ContactHandler, ContactRequest};
pub use filter::FilterHandler;
pub use recommend::{FixedJitter, JitterSource, RandomJitter, Recommendation, RecommendHandler};
pub use search::SearchHandler;
pub use select::SelectHandler;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::creators::{Creator, CreatorSource};
use crate::notify::Notifier;
use crate::task::{Task, TaskType};

/// Handler failures. The `Display` text is what ends up in `Task::error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    #[error("No valid search results found from previous task")]
    MissingSearchResults,

    #[error("No creators to contact from previous tasks")]
    NoCreatorsToContact,

    #[error("No candidates for recommendations from previous tasks")]
    NoCandidates,

    #[error("No options available for selection")]
    NoOptions,

    #[error("No handler registered for task type: {0}")]
    NoHandler(TaskType),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Everything a handler may read.
#[derive(Debug, Clone)]
pub struct HandlerContext<'a> {
    pub task: &'a Task,
    /// Lowercased text that keyword extraction runs against
    pub criteria: String,
    /// Upstream result resolved by the executor
    pub input: Option<Value>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(task: &'a Task, criteria: &str, input: Option<Value>) -> Self {
        Self {
            task,
            criteria: criteria.to_lowercase(),
            input,
        }
    }

    /// The input as a list of creators, if it is one.
    pub fn creators(&self) -> Option<Vec<Creator>> {
        creators_from(self.input.as_ref()?)
    }

    /// The input as a raw list, if it is one.
    pub fn items(&self) -> Option<&Vec<Value>> {
        self.input.as_ref()?.as_array()
    }
}

fn creators_from(value: &Value) -> Option<Vec<Creator>> {
    if !value.is_array() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Business logic for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Simulated latency before the handler resolves, at scale 1.0.
    fn delay(&self) -> Duration;

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError>;
}

/// Maps task types to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in handlers.
    pub fn with_defaults(
        source: Arc<dyn CreatorSource>,
        notifier: Arc<dyn Notifier>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchHandler::new(source)));
        registry.register(Arc::new(FilterHandler));
        registry.register(Arc::new(RecommendHandler::new(jitter)));
        registry.register(Arc::new(ContactHandler::new(notifier)));
        registry.register(Arc::new(AnalyzeHandler));
        registry.register(Arc::new(SelectHandler));
        registry
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
