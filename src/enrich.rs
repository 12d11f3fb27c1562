use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::artifact;
use crate::context::RunContext;
use crate::error::Result;
use crate::pipeline::StageReport;
use crate::schema::{EnrichedAdRecord, MediaType, NormalizedAdRecord};

pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Capability interface for best-effort language detection, so tests can
/// substitute a deterministic stub and detectors can be swapped without
/// touching enrichment logic.
pub trait LanguageDetector: Send + Sync {
    /// Detects the dominant language of `text`, returning a language code,
    /// or `None` when no confident guess is possible.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Production detector backed by whatlang. Returns ISO 639-3 codes.
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        whatlang::detect(text).map(|info| info.lang().code().to_string())
    }
}

/// Outcome of the pure enrichment pass over one batch.
#[derive(Debug)]
pub struct EnrichOutcome {
    pub records: Vec<EnrichedAdRecord>,
    /// Records where at least one derived field fell back to its default.
    pub degraded: usize,
}

/// Enrich stage entry point: silver artifact in, gold artifact out.
///
/// Enrichment is total; the output has exactly one record per parseable
/// input record and per-field failures degrade to defaults.
pub fn enrich(
    ctx: &RunContext,
    input: &Path,
    detector: &dyn LanguageDetector,
) -> Result<StageReport> {
    info!("Starting enrichment of {}", input.display());

    let lines = artifact::read_lines(input)?;
    let input_count = lines.len();

    let mut ads = Vec::with_capacity(lines.len());
    let mut unparseable = 0usize;
    for (line_no, line) in lines.iter().enumerate() {
        match serde_json::from_str::<NormalizedAdRecord>(line) {
            Ok(ad) => ads.push(ad),
            Err(e) => {
                tracing::warn!("Skipping unparseable silver line {}: {}", line_no + 1, e);
                unparseable += 1;
            }
        }
    }

    let outcome = enrich_all(ads, detector, Utc::now());
    let output_path = ctx.enriched_artifact_path();
    let artifact = artifact::write_jsonl(&output_path, &outcome.records)?;

    info!(
        "Enrichment completed: {} in, {} out, {} degraded, {} unparseable",
        input_count,
        outcome.records.len(),
        outcome.degraded,
        unparseable
    );

    Ok(StageReport {
        stage: "enrich",
        input_count,
        output_count: outcome.records.len(),
        dropped: unparseable,
        degraded: outcome.degraded,
        artifact,
    })
}

/// Enriches a whole batch with a shared stamp. Never drops a record.
pub fn enrich_all(
    ads: Vec<NormalizedAdRecord>,
    detector: &dyn LanguageDetector,
    enriched_at: DateTime<Utc>,
) -> EnrichOutcome {
    let mut records = Vec::with_capacity(ads.len());
    let mut degraded = 0usize;

    for ad in ads {
        let (record, record_degraded) = enrich_record(ad, detector, enriched_at);
        if record_degraded {
            degraded += 1;
        }
        records.push(record);
    }

    EnrichOutcome { records, degraded }
}

/// Derives duration, media class, and language for one record.
///
/// The boolean is true when a derived field had to fall back to its default
/// (zero duration from missing/invalid bounds, or undetectable language).
pub fn enrich_record(
    ad: NormalizedAdRecord,
    detector: &dyn LanguageDetector,
    enriched_at: DateTime<Utc>,
) -> (EnrichedAdRecord, bool) {
    let duration_hours = duration_hours(ad.ad_delivery_start_time, ad.ad_delivery_stop_time);
    let duration_defaulted = match (ad.ad_delivery_start_time, ad.ad_delivery_stop_time) {
        (Some(start), Some(stop)) => stop < start,
        _ => true,
    };

    let media_type = MediaType::from_flags(ad.has_image, ad.has_video);

    let language = primary_text(&ad)
        .and_then(|text| detector.detect(text))
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());
    let language_defaulted = language == UNKNOWN_LANGUAGE;

    debug!(
        "Enriched '{}': duration={}h media={} language={}",
        ad.ad_id, duration_hours, media_type, language
    );

    let record = EnrichedAdRecord {
        ad,
        duration_hours,
        media_type,
        language,
        enriched_at,
    };
    (record, duration_defaulted || language_defaulted)
}

/// Delivery window length in decimal hours, clamped to zero.
///
/// Absent bounds or a stop before the start yield 0.0 rather than an error;
/// the value is rounded to two decimals.
pub fn duration_hours(
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
) -> f64 {
    let (Some(start), Some(stop)) = (start, stop) else {
        return 0.0;
    };
    if stop <= start {
        return 0.0;
    }
    let hours = (stop - start).num_seconds() as f64 / 3600.0;
    (hours * 100.0).round() / 100.0
}

/// The designated text source for language detection: the creative body,
/// falling back to the page name.
fn primary_text(ad: &NormalizedAdRecord) -> Option<&str> {
    ad.ad_creative_body
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .or_else(|| Some(ad.page_name.as_str()).filter(|text| !text.trim().is_empty()))
}
