use serde::Serialize;
use tracing::{info, instrument};

use crate::artifact::ArtifactRef;
use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::enrich::{self, LanguageDetector};
use crate::error::Result;
use crate::extract;
use crate::normalize;
use crate::rank;

/// Summary of one stage execution, returned to the orchestrator.
///
/// `dropped` counts records excluded from the output (validation failures,
/// duplicates, unparseable lines); `degraded` counts records that were kept
/// but had a derived field fall back to its default.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub input_count: usize,
    pub output_count: usize,
    pub dropped: usize,
    pub degraded: usize,
    pub artifact: ArtifactRef,
}

/// Result of a complete extract → normalize → enrich → rank run.
#[derive(Debug, Serialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub stages: Vec<StageReport>,
}

impl PipelineRunResult {
    /// The terminal top-N artifact of this run.
    pub fn ranked_artifact(&self) -> Option<&ArtifactRef> {
        self.stages.last().map(|report| &report.artifact)
    }
}

/// Runs all four stages sequentially within one run context.
///
/// This is the local stand-in for the external scheduler: each stage
/// consumes the previous stage's artifact and any stage error aborts the
/// run. Individual stages stay independently callable for orchestrators
/// that sequence them as separate jobs.
#[instrument(skip(config, detector), fields(run_id = %ctx.run_id))]
pub async fn run_full_pipeline(
    ctx: &RunContext,
    config: &PipelineConfig,
    detector: &dyn LanguageDetector,
) -> Result<PipelineRunResult> {
    config.validate()?;
    info!("Starting pipeline run {}", ctx.run_id);

    let extract_report = extract::extract(ctx, config).await?;
    let normalize_report = normalize::normalize(ctx, &extract_report.artifact.path)?;
    let enrich_report = enrich::enrich(ctx, &normalize_report.artifact.path, detector)?;
    let rank_report = rank::rank(ctx, &enrich_report.artifact.path, config.top_n, &config.scoring)?;

    info!(
        "Pipeline run {} finished: {} raw, {} normalized, {} enriched, {} ranked",
        ctx.run_id,
        extract_report.output_count,
        normalize_report.output_count,
        enrich_report.output_count,
        rank_report.output_count
    );

    Ok(PipelineRunResult {
        run_id: ctx.run_id.clone(),
        stages: vec![extract_report, normalize_report, enrich_report, rank_report],
    })
}
