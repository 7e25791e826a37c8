use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{HandlerContext, HandlerError, TaskHandler};
use crate::task::TaskType;

/// Summarizes upstream creators. Never fails: absent or empty input yields a
/// count of 0 and an average engagement of 0.
pub struct AnalyzeHandler;

#[async_trait]
impl TaskHandler for AnalyzeHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Analyze
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(1000)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let creators = ctx.creators().unwrap_or_default();
        let total = creators.len();
        let average = if total == 0 {
            0.0
        } else {
            creators.iter().map(|c| c.engagement_rate).sum::<f64>() / total as f64
        };

        Ok(json!({
            "totalCount": total,
            "averageEngagement": average,
            "audienceDemographics": {
                "18-24": 0.35,
                "25-34": 0.40,
                "35-44": 0.15,
                "45+": 0.10,
            },
            "growthTrend": "positive",
            "contentPerformance": "above average",
        }))
    }
}
