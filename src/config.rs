use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::rank::ScoringTable;

pub const DEFAULT_TOP_N: usize = 10;
const CONFIG_PATH: &str = "config.toml";

/// Which source the extractor pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Mock,
    Api,
}

impl FromStr for ExtractionMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(ExtractionMode::Mock),
            "api" => Ok(ExtractionMode::Api),
            other => Err(PipelineError::Configuration(format!(
                "unknown mode '{}', supported modes: mock, api",
                other
            ))),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Mock => write!(f, "mock"),
            ExtractionMode::Api => write!(f, "api"),
        }
    }
}

/// Settings for the synthetic source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Number of records to generate per run.
    pub count: usize,
    /// Fixed RNG seed for reproducible batches; random when unset.
    pub seed: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { count: 50, seed: None }
    }
}

/// Settings for the live ad-archive source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub search_terms: String,
    pub countries: Vec<String>,
    /// Bounded per-request timeout; a timeout surfaces as SourceUnavailable.
    pub timeout_seconds: u64,
    /// Maximum number of pagination cursors to follow in one run.
    pub page_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com/v18.0/ads_archive".to_string(),
            search_terms: "microlearning".to_string(),
            countries: vec!["US".to_string()],
            timeout_seconds: 30,
            page_limit: 5,
        }
    }
}

/// On-disk shape of config.toml; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    mode: Option<String>,
    top_n: Option<usize>,
    data_root: Option<PathBuf>,
    mock: MockConfig,
    api: ApiConfig,
    scoring: ScoringTable,
}

/// Fully resolved pipeline configuration: config.toml values overridden by
/// environment variables (`ADS_MODE`, `ADS_TOP_N`, `ADS_DATA_ROOT`,
/// `ACCESS_TOKEN`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: ExtractionMode,
    pub top_n: usize,
    pub data_root: PathBuf,
    pub mock: MockConfig,
    pub api: ApiConfig,
    pub scoring: ScoringTable,
    pub access_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Mock,
            top_n: DEFAULT_TOP_N,
            data_root: PathBuf::from("data"),
            mock: MockConfig::default(),
            api: ApiConfig::default(),
            scoring: ScoringTable::default(),
            access_token: None,
        }
    }
}

impl PipelineConfig {
    /// Loads config.toml if present and applies environment overrides.
    /// Call `validate` after any CLI-level overrides have been applied.
    pub fn load() -> Result<Self> {
        let file = match fs::read_to_string(CONFIG_PATH) {
            Ok(content) => toml::from_str::<FileConfig>(&content).map_err(|e| {
                PipelineError::Configuration(format!(
                    "failed to parse '{}': {}",
                    CONFIG_PATH, e
                ))
            })?,
            Err(_) => FileConfig::default(),
        };

        let mut config = PipelineConfig {
            mode: match file.mode {
                Some(mode) => mode.parse()?,
                None => ExtractionMode::Mock,
            },
            top_n: file.top_n.unwrap_or(DEFAULT_TOP_N),
            data_root: file.data_root.unwrap_or_else(|| PathBuf::from("data")),
            mock: file.mock,
            api: file.api,
            scoring: file.scoring,
            access_token: None,
        };

        if let Ok(mode) = env::var("ADS_MODE") {
            config.mode = mode.parse()?;
        }
        if let Ok(top_n) = env::var("ADS_TOP_N") {
            config.top_n = top_n.trim().parse().map_err(|_| {
                PipelineError::Configuration(format!("ADS_TOP_N must be a positive integer, got '{}'", top_n))
            })?;
        }
        if let Ok(root) = env::var("ADS_DATA_ROOT") {
            config.data_root = PathBuf::from(root);
        }
        config.access_token = env::var("ACCESS_TOKEN").ok().filter(|t| !t.trim().is_empty());

        Ok(config)
    }

    /// Rejects configurations the pipeline must not run with. Raised before
    /// any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(PipelineError::Configuration(
                "top_n must be a positive integer".to_string(),
            ));
        }
        if self.mode == ExtractionMode::Api && self.access_token.is_none() {
            return Err(PipelineError::Configuration(
                "ACCESS_TOKEN environment variable is required when mode=api".to_string(),
            ));
        }
        Ok(())
    }
}
