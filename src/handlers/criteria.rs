//! Keyword extraction of search and filter criteria from request text.
//!
//! Input is expected to be lowercased already.

use crate::creators::Creator;

pub const NICHES: &[&str] = &[
    "tech", "beauty", "fashion", "gaming", "travel", "fitness", "food",
];

pub const HIGH_ENGAGEMENT: f64 = 0.05;
pub const POPULAR_FOLLOWERS: u64 = 500_000;

/// Follower phrases, highest threshold first; the first match wins.
const FOLLOWER_THRESHOLDS: &[(&[&str], u64)] = &[
    (&["1m", "1 million"], 1_000_000),
    (&["500k"], 500_000),
    (&["100k"], 100_000),
];

/// Predicates for the search handler. Absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub niche: Option<&'static str>,
    pub min_followers: Option<u64>,
    pub min_engagement: Option<f64>,
}

impl SearchCriteria {
    pub fn from_text(text: &str) -> Self {
        Self {
            niche: NICHES.iter().copied().find(|n| text.contains(*n)),
            min_followers: follower_threshold(text),
            min_engagement: text.contains("high engagement").then_some(HIGH_ENGAGEMENT),
        }
    }

    pub fn matches(&self, creator: &Creator) -> bool {
        self.niche.map_or(true, |n| creator.has_niche(n))
            && self.min_followers.map_or(true, |f| creator.followers >= f)
            && self.min_engagement.map_or(true, |e| creator.engagement_rate >= e)
    }
}

/// Narrowing and ordering for the filter handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub sort_by_quality: bool,
    pub min_engagement: Option<f64>,
    pub min_followers: Option<u64>,
}

impl FilterCriteria {
    pub fn from_text(text: &str) -> Self {
        Self {
            sort_by_quality: text.contains("best") || text.contains("top"),
            min_engagement: text.contains("high engagement").then_some(HIGH_ENGAGEMENT),
            min_followers: text.contains("popular").then_some(POPULAR_FOLLOWERS),
        }
    }

    pub fn matches(&self, creator: &Creator) -> bool {
        self.min_engagement.map_or(true, |e| creator.engagement_rate >= e)
            && self.min_followers.map_or(true, |f| creator.followers >= f)
    }
}

fn follower_threshold(text: &str) -> Option<u64> {
    FOLLOWER_THRESHOLDS
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| text.contains(*p)))
        .map(|(_, threshold)| *threshold)
}
