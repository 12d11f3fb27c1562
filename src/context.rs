use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

/// Staged data-quality tiers: raw, normalized, enriched/ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit per-run state passed into every stage call.
///
/// The run id groups one execution's artifacts across all stages; the
/// orchestrator supplies it so concurrent runs version their artifacts
/// independently. No stage reads versioning state from anywhere else.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub data_root: PathBuf,
}

impl RunContext {
    pub fn new(data_root: impl Into<PathBuf>, run_id: Option<String>) -> Self {
        let run_id = run_id.unwrap_or_else(|| Utc::now().format("%Y%m%d_%H%M%S").to_string());
        Self {
            run_id,
            data_root: data_root.into(),
        }
    }

    /// Versioned artifact path: `{layer}/{dataset}_{run_id}.{ext}`.
    pub fn artifact_path(&self, layer: Layer, dataset: &str, ext: &str) -> PathBuf {
        self.data_root
            .join(layer.as_str())
            .join(format!("{}_{}.{}", dataset, self.run_id, ext))
    }

    pub fn raw_artifact_path(&self) -> PathBuf {
        self.artifact_path(Layer::Bronze, "ads_raw", "jsonl")
    }

    pub fn normalized_artifact_path(&self) -> PathBuf {
        self.artifact_path(Layer::Silver, "ads_normalized", "jsonl")
    }

    pub fn enriched_artifact_path(&self) -> PathBuf {
        self.artifact_path(Layer::Gold, "ads_enriched", "jsonl")
    }

    pub fn ranked_artifact_path(&self) -> PathBuf {
        self.artifact_path(Layer::Gold, "top_ads", "csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_follow_naming_convention() {
        let ctx = RunContext::new("data", Some("20250601_120000".to_string()));
        assert_eq!(
            ctx.raw_artifact_path(),
            PathBuf::from("data/bronze/ads_raw_20250601_120000.jsonl")
        );
        assert_eq!(
            ctx.normalized_artifact_path(),
            PathBuf::from("data/silver/ads_normalized_20250601_120000.jsonl")
        );
        assert_eq!(
            ctx.enriched_artifact_path(),
            PathBuf::from("data/gold/ads_enriched_20250601_120000.jsonl")
        );
        assert_eq!(
            ctx.ranked_artifact_path(),
            PathBuf::from("data/gold/top_ads_20250601_120000.csv")
        );
    }

    #[test]
    fn generated_run_id_is_timestamp_shaped() {
        let ctx = RunContext::new("data", None);
        assert_eq!(ctx.run_id.len(), 15);
        assert_eq!(&ctx.run_id[8..9], "_");
    }
}
