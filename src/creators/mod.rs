//! Creator dataset providers.
//!
//! Handlers never own the dataset; they read it through [`CreatorSource`].
//! - `MockCreatorSource`: built-in fictional dataset
//! - `JsonFileCreatorSource`: JSON array of creator records loaded from disk

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A creator record as consumed by the handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: String,
    pub full_name: String,
    pub followers: u64,
    /// Fraction in [0, 1], e.g. 0.05 for 5%
    pub engagement_rate: f64,
    #[serde(default)]
    pub niche: Vec<String>,
}

impl Creator {
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        followers: u64,
        engagement_rate: f64,
        niche: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            followers,
            engagement_rate,
            niche: niche.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn has_niche(&self, niche: &str) -> bool {
        self.niche.iter().any(|n| n.eq_ignore_ascii_case(niche))
    }
}

/// Supplies the creator dataset, in a stable order.
pub trait CreatorSource: Send + Sync {
    fn creators(&self) -> Vec<Creator>;
}

/// Errors loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory dataset. `default()` yields the built-in fixture.
#[derive(Debug, Clone)]
pub struct MockCreatorSource {
    creators: Vec<Creator>,
}

impl MockCreatorSource {
    pub fn new(creators: Vec<Creator>) -> Self {
        Self { creators }
    }
}

impl Default for MockCreatorSource {
    fn default() -> Self {
        Self::new(vec![
            Creator::new("c1", "Alex Chen", 1_200_000, 0.045, &["tech", "gaming"]),
            Creator::new("c2", "Maya Patel", 850_000, 0.062, &["beauty", "fashion"]),
            Creator::new("c3", "Jordan Lee", 520_000, 0.071, &["gaming"]),
            Creator::new("c4", "Sofia Rossi", 2_300_000, 0.038, &["fashion", "travel"]),
            Creator::new("c5", "Liam O'Brien", 150_000, 0.089, &["fitness", "food"]),
            Creator::new("c6", "Priya Nair", 95_000, 0.054, &["tech"]),
            Creator::new("c7", "Marcus Johnson", 640_000, 0.066, &["fitness"]),
            Creator::new("c8", "Elena Garcia", 310_000, 0.052, &["food", "travel"]),
            Creator::new("c9", "Kenji Watanabe", 1_050_000, 0.048, &["gaming", "tech"]),
            Creator::new("c10", "Chloe Martin", 720_000, 0.058, &["beauty"]),
            Creator::new("c11", "Noah Williams", 480_000, 0.043, &["travel"]),
            Creator::new("c12", "Aisha Bello", 205_000, 0.077, &["fashion", "beauty"]),
        ])
    }
}

impl CreatorSource for MockCreatorSource {
    fn creators(&self) -> Vec<Creator> {
        self.creators.clone()
    }
}

/// Dataset loaded once from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileCreatorSource {
    path: PathBuf,
    creators: Vec<Creator>,
}

impl JsonFileCreatorSource {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;
        let creators: Vec<Creator> =
            serde_json::from_str(&content).map_err(|source| DatasetError::Parse {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), count = creators.len(), "Loaded creator dataset");
        Ok(Self { path, creators })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CreatorSource for JsonFileCreatorSource {
    fn creators(&self) -> Vec<Creator> {
        self.creators.clone()
    }
}
