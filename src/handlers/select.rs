use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{HandlerContext, HandlerError, TaskHandler};
use crate::task::TaskType;

pub const SELECT_COUNT: usize = 3;

/// Picks the first three upstream items, unchanged.
pub struct SelectHandler;

#[async_trait]
impl TaskHandler for SelectHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Select
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(700)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let items = ctx
            .items()
            .filter(|items| !items.is_empty())
            .ok_or(HandlerError::NoOptions)?;

        Ok(Value::Array(items.iter().take(SELECT_COUNT).cloned().collect()))
    }
}
