use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::criteria::FilterCriteria;
use super::{HandlerContext, HandlerError, TaskHandler};
use crate::creators::Creator;
use crate::task::TaskType;

/// Narrows upstream search results and, for "best"/"top" requests, orders them
/// by engagement, highest first.
pub struct FilterHandler;

#[async_trait]
impl TaskHandler for FilterHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Filter
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(800)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let creators = ctx.creators().ok_or(HandlerError::MissingSearchResults)?;
        let criteria = FilterCriteria::from_text(&ctx.criteria);

        let mut kept: Vec<Creator> = creators
            .into_iter()
            .filter(|c| criteria.matches(c))
            .collect();
        if criteria.sort_by_quality {
            kept.sort_by(|a, b| b.engagement_rate.total_cmp(&a.engagement_rate));
        }

        tracing::debug!(kept = kept.len(), sorted = criteria.sort_by_quality, "Filter finished");
        Ok(serde_json::to_value(kept).unwrap_or_else(|_| Value::Array(Vec::new())))
    }
}
