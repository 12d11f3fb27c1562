use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::artifact;
use crate::config::{ExtractionMode, PipelineConfig};
use crate::context::RunContext;
use crate::error::{PipelineError, Result};
use crate::pipeline::StageReport;
use crate::schema::{RawAdRecord, SourceKind};

pub mod api;
pub mod mock;

pub use api::AdLibraryClient;
pub use mock::MockAdSource;

/// A source of raw ad payloads: the synthetic generator or the live
/// ad-archive API. Pagination, backoff, and credentials live behind this
/// seam; the extract stage only sees payload batches.
#[async_trait]
pub trait AdSource: Send + Sync {
    fn source_kind(&self) -> SourceKind;

    async fn fetch(&self) -> Result<Vec<serde_json::Map<String, serde_json::Value>>>;
}

/// Builds the source for the configured mode.
///
/// Configuration problems (api mode without a token) surface here, before
/// any I/O is attempted.
pub fn source_for_mode(config: &PipelineConfig) -> Result<Box<dyn AdSource>> {
    match config.mode {
        ExtractionMode::Mock => Ok(Box::new(MockAdSource::new(config.mock.clone()))),
        ExtractionMode::Api => {
            let token = config
                .access_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    PipelineError::Configuration(
                        "ACCESS_TOKEN environment variable is required when mode=api".to_string(),
                    )
                })?;
            Ok(Box::new(AdLibraryClient::new(
                config.api.clone(),
                token.to_string(),
            )?))
        }
    }
}

/// Extract stage entry point: pulls payloads from the configured source,
/// tags each with provenance and ingestion time, and writes the bronze
/// artifact.
pub async fn extract(ctx: &RunContext, config: &PipelineConfig) -> Result<StageReport> {
    let source = source_for_mode(config)?;
    info!("Starting extraction in {} mode", config.mode);

    let payloads = source.fetch().await?;
    let ingested_at = Utc::now();
    let records: Vec<RawAdRecord> = payloads
        .into_iter()
        .map(|raw_data| RawAdRecord {
            source: source.source_kind(),
            ingested_at,
            raw_data,
        })
        .collect();

    let output_path = ctx.raw_artifact_path();
    let artifact = artifact::write_jsonl(&output_path, &records)?;

    info!(
        "Extraction completed: {} records written to {}",
        records.len(),
        output_path.display()
    );

    Ok(StageReport {
        stage: "extract",
        input_count: records.len(),
        output_count: records.len(),
        dropped: 0,
        degraded: 0,
        artifact,
    })
}
