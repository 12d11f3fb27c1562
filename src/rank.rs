use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::{self, ArtifactRef};
use crate::context::RunContext;
use crate::error::{PipelineError, Result};
use crate::pipeline::StageReport;
use crate::schema::{EnrichedAdRecord, MediaType, RankedAd};

/// Proxy-score multipliers per media class.
///
/// Exposed as configuration (a `[scoring]` table in config.toml) so alternate
/// weighting strategies can be substituted without touching the sort and
/// truncate logic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringTable {
    pub both: f64,
    pub video_only: f64,
    pub image_only: f64,
    pub none: f64,
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            both: 1.8,
            video_only: 1.5,
            image_only: 1.2,
            none: 0.5,
        }
    }
}

impl ScoringTable {
    pub fn multiplier(&self, media_type: MediaType) -> f64 {
        match media_type {
            MediaType::Both => self.both,
            MediaType::VideoOnly => self.video_only,
            MediaType::ImageOnly => self.image_only,
            MediaType::None => self.none,
        }
    }
}

/// Heuristic performance estimate standing in for unavailable engagement
/// metrics: delivery duration weighted by media richness.
pub fn proxy_score(ad: &EnrichedAdRecord, table: &ScoringTable) -> f64 {
    ad.duration_hours.max(0.0) * table.multiplier(ad.media_type)
}

/// Scores, sorts descending (stable, so ties preserve input order), and
/// truncates to the `top_n` best records.
pub fn rank_all(ads: Vec<EnrichedAdRecord>, top_n: usize, table: &ScoringTable) -> Vec<RankedAd> {
    let mut ranked: Vec<RankedAd> = ads
        .into_iter()
        .map(|ad| RankedAd {
            score: proxy_score(&ad, table),
            ad,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_n);
    ranked
}

/// Tabular row of the terminal artifact.
#[derive(Debug, Serialize)]
struct RankedCsvRow<'a> {
    ad_id: &'a str,
    duration_hours: f64,
    media_type: &'static str,
    language: &'a str,
    score: f64,
}

/// Rank stage entry point: gold artifact in, top-N CSV out.
pub fn rank(
    ctx: &RunContext,
    input: &Path,
    top_n: usize,
    table: &ScoringTable,
) -> Result<StageReport> {
    if top_n == 0 {
        return Err(PipelineError::Configuration(
            "top_n must be a positive integer".to_string(),
        ));
    }

    info!("Starting ranking of {} (top {})", input.display(), top_n);

    let lines = artifact::read_lines(input)?;
    let input_count = lines.len();

    let mut ads = Vec::with_capacity(lines.len());
    let mut unparseable = 0usize;
    for (line_no, line) in lines.iter().enumerate() {
        match serde_json::from_str::<EnrichedAdRecord>(line) {
            Ok(ad) => ads.push(ad),
            Err(e) => {
                tracing::warn!("Skipping unparseable gold line {}: {}", line_no + 1, e);
                unparseable += 1;
            }
        }
    }

    let ranked = rank_all(ads, top_n, table);
    let output_path = ctx.ranked_artifact_path();
    let artifact = write_ranked_csv(&output_path, &ranked)?;

    info!(
        "Ranking completed: {} in, {} ranked, {} unparseable",
        input_count,
        ranked.len(),
        unparseable
    );

    Ok(StageReport {
        stage: "rank",
        input_count,
        output_count: ranked.len(),
        dropped: unparseable,
        degraded: 0,
        artifact,
    })
}

/// Serializes the ranked records as CSV (header row included) and writes the
/// bytes atomically.
fn write_ranked_csv(path: &Path, ranked: &[RankedAd]) -> Result<ArtifactRef> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in ranked {
        let row = RankedCsvRow {
            ad_id: &entry.ad.ad.ad_id,
            duration_hours: entry.ad.duration_hours,
            media_type: entry.ad.media_type.as_str(),
            language: &entry.ad.language,
            score: entry.score,
        };
        writer
            .serialize(row)
            .map_err(|e| PipelineError::ArtifactWrite {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::ArtifactWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;
    artifact::write_bytes(path, &bytes)?;
    Ok(ArtifactRef {
        path: path.to_path_buf(),
        record_count: ranked.len(),
    })
}
