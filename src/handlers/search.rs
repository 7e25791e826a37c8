use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::criteria::SearchCriteria;
use super::{HandlerContext, HandlerError, TaskHandler};
use crate::creators::{Creator, CreatorSource};
use crate::task::TaskType;

/// AND-filters the dataset on the niche, follower, and engagement predicates
/// found in the criteria text. Dataset order is preserved; an empty result is
/// still a success.
pub struct SearchHandler {
    source: Arc<dyn CreatorSource>,
}

impl SearchHandler {
    pub fn new(source: Arc<dyn CreatorSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl TaskHandler for SearchHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Search
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(1000)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let criteria = SearchCriteria::from_text(&ctx.criteria);
        let matches: Vec<Creator> = self
            .source
            .creators()
            .into_iter()
            .filter(|c| criteria.matches(c))
            .collect();

        tracing::debug!(
            niche = ?criteria.niche,
            min_followers = ?criteria.min_followers,
            min_engagement = ?criteria.min_engagement,
            found = matches.len(),
            "Search finished"
        );

        Ok(serde_json::to_value(matches).unwrap_or_else(|_| Value::Array(Vec::new())))
    }
}
