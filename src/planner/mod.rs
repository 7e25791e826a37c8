//! Request decomposition - turns free-form request text into an ordered plan.
//!
//! The keyword planner encodes an implicit pipeline:
//! discover candidates -> narrow -> rank -> act.
//! Rules are additive and evaluated in that fixed order.

use crate::task::{SubtaskSpec, TaskType};

/// Translates request text into an ordered list of subtask specs.
///
/// Implementations must be deterministic for a given input; the store creates
/// children in exactly the returned order and the executor runs them in it.
pub trait Decomposer: Send + Sync {
    fn decompose(&self, request: &str) -> Vec<SubtaskSpec>;
}

const SEARCH_KEYWORDS: &[&str] = &["find", "search", "look for", "discover"];
const QUALITY_KEYWORDS: &[&str] = &["best", "top", "popular", "with", "high"];
const RECOMMEND_KEYWORDS: &[&str] = &["recommend", "suggest", "best fit"];
const CONTACT_KEYWORDS: &[&str] = &["contact", "send", "message", "reach out"];

pub const SEARCH_LABEL: &str = "Search for relevant items based on criteria";
pub const FILTER_LABEL: &str = "Filter results based on quality criteria";
pub const RECOMMEND_LABEL: &str = "Generate recommendations based on criteria";
pub const CONTACT_LABEL: &str = "Prepare contact requests for selected items";
pub const FALLBACK_LABEL: &str = "Process general query";

/// Case-insensitive keyword-containment planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordDecomposer;

impl KeywordDecomposer {
    pub fn new() -> Self {
        Self
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

impl Decomposer for KeywordDecomposer {
    fn decompose(&self, request: &str) -> Vec<SubtaskSpec> {
        let text = request.to_lowercase();
        let mut plan = Vec::new();

        if contains_any(&text, SEARCH_KEYWORDS) {
            plan.push(SubtaskSpec::new(TaskType::Search, SEARCH_LABEL));
            if contains_any(&text, QUALITY_KEYWORDS) {
                plan.push(SubtaskSpec::new(TaskType::Filter, FILTER_LABEL));
            }
        }

        if contains_any(&text, RECOMMEND_KEYWORDS) {
            plan.push(SubtaskSpec::new(TaskType::Recommend, RECOMMEND_LABEL));
        }

        if contains_any(&text, CONTACT_KEYWORDS) {
            plan.push(SubtaskSpec::new(TaskType::Contact, CONTACT_LABEL));
        }

        if plan.is_empty() {
            plan.push(SubtaskSpec::new(TaskType::Search, FALLBACK_LABEL));
        }

        tracing::debug!(
            steps = plan.len(),
            "Decomposed request into [{}]",
            plan.iter()
                .map(|s| s.task_type.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        plan
    }
}
