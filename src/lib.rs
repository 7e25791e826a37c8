//! # taskflow
//!
//! Task orchestration engine: turns a free-form request into a tree of typed
//! subtasks and drives them sequentially through simulated handlers.
//!
//! ## Architecture
//!
//! ```text
//!   request ──▶ Decomposer ──▶ TaskStore ◀── observers / event channel
//!                                 ▲
//!                                 │ start / complete / fail
//!                                 │
//!                           TaskExecutor ──▶ HandlerRegistry
//!                                              search, filter, recommend,
//!                                              contact, analyze, select
//! ```
//!
//! ## Task Flow
//! 1. `Orchestrator::submit` plans the request into a compound task
//! 2. `Orchestrator::run` executes the subtasks in order, feeding each the
//!    previous result
//! 3. The store cascades completion and failure up to the parent
//! 4. Observers see every state change as typed events
//!
//! ## Modules
//! - `task`: task data, lifecycle, and events
//! - `store`: the single source of truth for task state
//! - `planner`: keyword decomposition of requests
//! - `handlers`: per-type task handlers and their registry
//! - `executor`: sequential execution and input resolution
//! - `engine`: the public facade

pub mod config;
pub mod creators;
pub mod engine;
pub mod executor;
pub mod handlers;
pub mod notify;
pub mod planner;
pub mod store;
pub mod task;

pub use config::EngineConfig;
pub use engine::{EngineError, Orchestrator};
pub use store::{Subscription, TaskNode, TaskStore};
pub use task::{Task, TaskEvent, TaskId, TaskStatus, TaskType};
