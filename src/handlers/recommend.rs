use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HandlerContext, HandlerError, TaskHandler};
use crate::creators::Creator;
use crate::task::TaskType;

/// How many recommendations are returned.
pub const TOP_N: usize = 5;

/// Source of the random jitter added to recommendation scores.
pub trait JitterSource: Send + Sync {
    fn next_jitter(&self) -> f64;
}

/// Uniform jitter in `[0, max)` from a `StdRng`.
pub struct RandomJitter {
    rng: Mutex<StdRng>,
    max: f64,
}

impl RandomJitter {
    pub fn new(max: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            max,
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(max: f64, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max,
        }
    }
}

impl JitterSource for RandomJitter {
    fn next_jitter(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0.0..self.max)
    }
}

/// Always returns the same jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn next_jitter(&self) -> f64 {
        self.0
    }
}

/// A creator with its recommendation score.
///
/// Serialized flat, so downstream steps can still read it as a creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub creator: Creator,
    pub score: f64,
}

/// Scores candidates by engagement plus jitter and keeps the top five.
pub struct RecommendHandler {
    jitter: Arc<dyn JitterSource>,
}

impl RecommendHandler {
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    fn rank(&self, candidates: Vec<Creator>) -> Vec<Recommendation> {
        let mut scored: Vec<Recommendation> = candidates
            .into_iter()
            .map(|creator| {
                let score = (creator.engagement_rate * 100.0).round() + self.jitter.next_jitter();
                Recommendation { creator, score }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(TOP_N);
        scored
    }
}

#[async_trait]
impl TaskHandler for RecommendHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Recommend
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(1200)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let candidates = ctx
            .creators()
            .filter(|c| !c.is_empty())
            .ok_or(HandlerError::NoCandidates)?;

        let ranked = self.rank(candidates);
        tracing::debug!(count = ranked.len(), "Recommendations ranked");
        Ok(serde_json::to_value(ranked).unwrap_or_else(|_| Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{creators_value, fixture};
    use crate::task::Task;
    use serde_json::json;

    fn ranked_ids(value: &Value) -> Vec<&str> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn fixed_jitter_gives_exact_top_five() {
        let handler = RecommendHandler::new(Arc::new(FixedJitter(0.0)));
        let task = Task::new(TaskType::Recommend, "recommend");
        let ctx = HandlerContext::new(&task, "", Some(creators_value(&fixture())));

        let result = handler.handle(&ctx).await.unwrap();
        // Rounded scores: c5 9, c12 8, c3 7, c7 7, c2 6, c10 6 ... ties keep input order.
        assert_eq!(ranked_ids(&result), vec!["c5", "c12", "c3", "c7", "c2"]);
        assert_eq!(result[0]["score"], json!(9.0));
        assert_eq!(result[0]["fullName"], "Liam O'Brien");
    }

    #[tokio::test]
    async fn same_seed_same_order() {
        let run = |seed| async move {
            let handler = RecommendHandler::new(Arc::new(RandomJitter::seeded(5.0, seed)));
            let task = Task::new(TaskType::Recommend, "recommend");
            let ctx = HandlerContext::new(&task, "", Some(creators_value(&fixture())));
            handler.handle(&ctx).await.unwrap()
        };
        assert_eq!(run(42).await, run(42).await);
    }

    #[test]
    fn jitter_stays_in_range() {
        let jitter = RandomJitter::seeded(2.0, 7);
        for _ in 0..100 {
            let j = jitter.next_jitter();
            assert!((0.0..2.0).contains(&j));
        }
        assert_eq!(RandomJitter::new(0.0).next_jitter(), 0.0);
    }

    #[tokio::test]
    async fn empty_or_missing_candidates_fail() {
        let handler = RecommendHandler::new(Arc::new(FixedJitter(0.0)));
        let task = Task::new(TaskType::Recommend, "recommend");
        for input in [None, Some(json!([]))] {
            let ctx = HandlerContext::new(&task, "", input);
            assert_eq!(
                handler.handle(&ctx).await.unwrap_err(),
                HandlerError::NoCandidates
            );
        }
    }

    #[tokio::test]
    async fn recommendations_read_back_as_creators() {
        let handler = RecommendHandler::new(Arc::new(FixedJitter(0.5)));
        let task = Task::new(TaskType::Recommend, "recommend");
        let ctx = HandlerContext::new(&task, "", Some(creators_value(&fixture()[..2])));

        let result = handler.handle(&ctx).await.unwrap();
        let downstream = HandlerContext::new(&task, "", Some(result));
        assert_eq!(downstream.creators().unwrap().len(), 2);
    }
}
