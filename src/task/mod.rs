//! Task module - defines tasks, their lifecycle, planned subtasks, and events.
//!
//! - All types use algebraic data types with exhaustive matching
//! - Invariants are documented and enforced where state changes
//! - Pure data only; the store performs every mutation

mod events;
mod subtask;
pub mod task;

pub use events::TaskEvent;
pub use subtask::SubtaskSpec;
pub use task::{Task, TaskError, TaskId, TaskStatus, TaskType};
