use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::artifact;
use crate::context::RunContext;
use crate::error::Result;
use crate::pipeline::StageReport;
use crate::schema::{NormalizedAdRecord, RawAdRecord};

/// Outcome of the pure normalization pass over one batch.
#[derive(Debug)]
pub struct NormalizeOutcome {
    pub records: Vec<NormalizedAdRecord>,
    pub dropped_missing_id: usize,
    pub dropped_duplicate: usize,
}

impl NormalizeOutcome {
    pub fn dropped(&self) -> usize {
        self.dropped_missing_id + self.dropped_duplicate
    }
}

/// Normalize stage entry point: bronze artifact in, silver artifact out.
///
/// Unparseable bronze lines are counted and skipped rather than failing the
/// stage; the only hard failures here are artifact read/write errors.
pub fn normalize(ctx: &RunContext, input: &Path) -> Result<StageReport> {
    info!("Starting normalization of {}", input.display());

    let lines = artifact::read_lines(input)?;
    let input_count = lines.len();

    let mut raws = Vec::with_capacity(lines.len());
    let mut unparseable = 0usize;
    for (line_no, line) in lines.iter().enumerate() {
        match serde_json::from_str::<RawAdRecord>(line) {
            Ok(raw) => raws.push(raw),
            Err(e) => {
                warn!("Skipping unparseable bronze line {}: {}", line_no + 1, e);
                unparseable += 1;
            }
        }
    }

    let outcome = normalize_all(&raws, Utc::now());
    let output_path = ctx.normalized_artifact_path();
    let artifact = artifact::write_jsonl(&output_path, &outcome.records)?;

    let dropped = outcome.dropped() + unparseable;
    info!(
        "Normalization completed: {} in, {} out, {} dropped ({} missing ad_id, {} duplicates, {} unparseable)",
        input_count,
        outcome.records.len(),
        dropped,
        outcome.dropped_missing_id,
        outcome.dropped_duplicate,
        unparseable
    );

    Ok(StageReport {
        stage: "normalize",
        input_count,
        output_count: outcome.records.len(),
        dropped,
        degraded: 0,
        artifact,
    })
}

/// Maps, validates, and deduplicates one batch of raw records.
///
/// Records without a non-empty `ad_id` are dropped; for duplicate ids the
/// first occurrence wins and output order follows first-occurrence input
/// order. The same `normalized_at` stamp is applied to the whole batch so a
/// rerun over identical input yields identical records.
pub fn normalize_all(raws: &[RawAdRecord], normalized_at: DateTime<Utc>) -> NormalizeOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(raws.len());
    let mut dropped_missing_id = 0usize;
    let mut dropped_duplicate = 0usize;

    for raw in raws {
        let Some(record) = normalize_record(raw, normalized_at) else {
            warn!(
                "Dropping {} record without ad_id (validation failure)",
                raw.source
            );
            dropped_missing_id += 1;
            continue;
        };
        if !seen.insert(record.ad_id.clone()) {
            debug!("Dropping duplicate ad_id '{}', first occurrence wins", record.ad_id);
            dropped_duplicate += 1;
            continue;
        }
        records.push(record);
    }

    NormalizeOutcome {
        records,
        dropped_missing_id,
        dropped_duplicate,
    }
}

/// Maps one raw payload onto the canonical schema.
///
/// Returns `None` only when the required `ad_id` is missing or empty; every
/// optional field degrades to `None` or its neutral default on coercion
/// failure, and the record is retained.
pub fn normalize_record(
    raw: &RawAdRecord,
    normalized_at: DateTime<Utc>,
) -> Option<NormalizedAdRecord> {
    let data = &raw.raw_data;

    let ad_id = id_field(data)?;

    let page_name = data
        .get("page_name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let ad_creative_body = text_field(data, &["ad_creative_body", "ad_text", "ad_creative_bodies"]);

    let has_image = media_flag(data, "has_image", "image");
    let has_video = media_flag(data, "has_video", "video");

    let (impressions_lower, impressions_upper) =
        bounds_field(data, "impressions", &ad_id, parse_count);
    let (spend_lower, spend_upper) = bounds_field(data, "spend", &ad_id, parse_money);

    Some(NormalizedAdRecord {
        ad_creation_time: time_field(data, "ad_creation_time", &ad_id),
        ad_delivery_start_time: time_field(data, "ad_delivery_start_time", &ad_id),
        ad_delivery_stop_time: time_field(data, "ad_delivery_stop_time", &ad_id),
        languages: languages_field(data),
        ad_id,
        page_name,
        ad_creative_body,
        has_image,
        has_video,
        impressions_lower,
        impressions_upper,
        spend_lower,
        spend_upper,
        normalized_at,
    })
}

/// Required identifier: `ad_id` or `id`, string or number, non-empty.
fn id_field(data: &Map<String, Value>) -> Option<String> {
    let value = data.get("ad_id").or_else(|| data.get("id"))?;
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        return None;
    }
    Some(id)
}

/// First present text value; arrays contribute their first string element
/// (the API returns `ad_creative_bodies` as a list).
fn text_field(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match data.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Array(items)) => {
                if let Some(first) = items.iter().find_map(|v| v.as_str()) {
                    if !first.trim().is_empty() {
                        return Some(first.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Boolean media flag, falling back to membership in a `media` array.
fn media_flag(data: &Map<String, Value>, key: &str, media_kind: &str) -> bool {
    if let Some(flag) = data.get(key).and_then(|v| v.as_bool()) {
        return flag;
    }
    data.get("media")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().any(|v| v.as_str() == Some(media_kind)))
        .unwrap_or(false)
}

/// Optional timestamp; a present but unparseable value is logged as a
/// coercion failure and becomes `None`.
fn time_field(data: &Map<String, Value>, key: &str, ad_id: &str) -> Option<DateTime<Utc>> {
    let value = data.get(key)?;
    let Some(text) = value.as_str() else {
        warn!("Coercion failure for '{}' of '{}': not a string", key, ad_id);
        return None;
    };
    match parse_timestamp(text) {
        Some(ts) => Some(ts),
        None => {
            warn!(
                "Coercion failure for '{}' of '{}': unparseable timestamp '{}'",
                key, ad_id, text
            );
            None
        }
    }
}

/// Accepts RFC 3339, naive date-times with or without fractional seconds,
/// and bare dates (midnight UTC).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

fn languages_field(data: &Map<String, Value>) -> Vec<String> {
    data.get("languages")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Range-valued metric: a scalar sets both bounds, a `{lower_bound,
/// upper_bound}` object sets each independently. Unparseable values become
/// `None` and are logged, never raised.
fn bounds_field<T, F>(
    data: &Map<String, Value>,
    key: &str,
    ad_id: &str,
    parse: F,
) -> (Option<T>, Option<T>)
where
    T: Copy,
    F: Fn(&Value) -> Option<T>,
{
    let Some(value) = data.get(key) else {
        return (None, None);
    };

    if let Some(object) = value.as_object() {
        let lower = object.get("lower_bound").and_then(|v| parse(v));
        let upper = object.get("upper_bound").and_then(|v| parse(v));
        if lower.is_none() && upper.is_none() {
            warn!("Coercion failure for '{}' of '{}': no usable bounds", key, ad_id);
        }
        return (lower, upper);
    }

    match parse(value) {
        Some(scalar) => (Some(scalar), Some(scalar)),
        None => {
            warn!("Coercion failure for '{}' of '{}': unparseable value", key, ad_id);
            (None, None)
        }
    }
}

/// Non-negative integer from a JSON number or numeric string.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

/// Non-negative numeric from a JSON number or numeric string.
fn parse_money(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| *v >= 0.0 && v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SourceKind;
    use serde_json::json;

    fn raw(payload: Value) -> RawAdRecord {
        RawAdRecord {
            source: SourceKind::Mock,
            ingested_at: Utc::now(),
            raw_data: payload.as_object().cloned().expect("object payload"),
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn full_record_maps_onto_canonical_schema() {
        let record = normalize_record(
            &raw(json!({
                "ad_id": "m1",
                "page_name": "Mock Page",
                "ad_creative_body": "Learn smarter, not harder",
                "ad_delivery_start_time": "2025-05-01T00:00:00Z",
                "ad_delivery_stop_time": "2025-05-01T10:00:00Z",
                "has_image": true,
                "has_video": true,
                "languages": ["en", "es"],
                "impressions": 12000,
                "spend": 140.5
            })),
            stamp(),
        )
        .expect("valid record");

        assert_eq!(record.ad_id, "m1");
        assert_eq!(record.page_name, "Mock Page");
        assert!(record.has_image && record.has_video);
        assert_eq!(record.languages, vec!["en", "es"]);
        assert_eq!(record.impressions_lower, Some(12000));
        assert_eq!(record.impressions_upper, Some(12000));
        assert_eq!(record.spend_lower, Some(140.5));
        let hours = (record.ad_delivery_stop_time.unwrap()
            - record.ad_delivery_start_time.unwrap())
        .num_hours();
        assert_eq!(hours, 10);
    }

    #[test]
    fn record_without_ad_id_is_dropped() {
        let outcome = normalize_all(
            &[raw(json!({"page_name": "No Id Page", "has_image": true}))],
            stamp(),
        );
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.dropped_missing_id, 1);
    }

    #[test]
    fn blank_ad_id_counts_as_missing() {
        let outcome = normalize_all(&[raw(json!({"ad_id": "   "}))], stamp());
        assert_eq!(outcome.dropped_missing_id, 1);
    }

    #[test]
    fn duplicate_ad_id_keeps_first_occurrence() {
        let outcome = normalize_all(
            &[
                raw(json!({"ad_id": "dup1", "page_name": "first"})),
                raw(json!({"ad_id": "other"})),
                raw(json!({"ad_id": "dup1", "page_name": "second"})),
            ],
            stamp(),
        );
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.dropped_duplicate, 1);
        assert_eq!(outcome.records[0].ad_id, "dup1");
        assert_eq!(outcome.records[0].page_name, "first");
        assert_eq!(outcome.records[1].ad_id, "other");
    }

    #[test]
    fn output_never_exceeds_input() {
        let raws: Vec<_> = (0..6)
            .map(|i| raw(json!({"ad_id": format!("ad_{}", i % 3)})))
            .collect();
        let outcome = normalize_all(&raws, stamp());
        assert!(outcome.records.len() <= raws.len());
        assert_eq!(outcome.records.len() + outcome.dropped(), raws.len());
    }

    #[test]
    fn numeric_id_is_stringified() {
        let record = normalize_record(&raw(json!({"id": 123456})), stamp()).unwrap();
        assert_eq!(record.ad_id, "123456");
    }

    #[test]
    fn media_flags_fall_back_to_media_array() {
        let record =
            normalize_record(&raw(json!({"ad_id": "m2", "media": ["image"]})), stamp()).unwrap();
        assert!(record.has_image);
        assert!(!record.has_video);

        let record =
            normalize_record(&raw(json!({"ad_id": "m3", "media": []})), stamp()).unwrap();
        assert!(!record.has_image && !record.has_video);
    }

    #[test]
    fn missing_media_information_defaults_to_false() {
        let record = normalize_record(&raw(json!({"ad_id": "m4"})), stamp()).unwrap();
        assert!(!record.has_image && !record.has_video);
    }

    #[test]
    fn bounds_object_with_string_members_is_coerced() {
        let record = normalize_record(
            &raw(json!({
                "ad_id": "m5",
                "impressions": {"lower_bound": "1000", "upper_bound": "4999"},
                "spend": {"lower_bound": "99.5", "upper_bound": "500"}
            })),
            stamp(),
        )
        .unwrap();
        assert_eq!(record.impressions_lower, Some(1000));
        assert_eq!(record.impressions_upper, Some(4999));
        assert_eq!(record.spend_lower, Some(99.5));
        assert_eq!(record.spend_upper, Some(500.0));
    }

    #[test]
    fn malformed_numeric_fields_become_none_and_record_survives() {
        let record = normalize_record(
            &raw(json!({
                "ad_id": "m6",
                "impressions": "lots",
                "spend": -4.0
            })),
            stamp(),
        )
        .expect("coercion failures must not drop the record");
        assert_eq!(record.impressions_lower, None);
        assert_eq!(record.spend_lower, None);
    }

    #[test]
    fn negative_impressions_are_rejected() {
        let record =
            normalize_record(&raw(json!({"ad_id": "m7", "impressions": -10})), stamp()).unwrap();
        assert_eq!(record.impressions_lower, None);
        assert_eq!(record.impressions_upper, None);
    }

    #[test]
    fn timestamp_formats_fall_back_gracefully() {
        assert!(parse_timestamp("2025-05-01T10:30:00Z").is_some());
        assert!(parse_timestamp("2025-05-01T10:30:00+02:00").is_some());
        assert!(parse_timestamp("2025-05-01T10:30:00.123456").is_some());
        assert!(parse_timestamp("2025-05-01 10:30:00").is_some());
        assert!(parse_timestamp("2025-05-01").is_some());
        assert!(parse_timestamp("last Tuesday").is_none());
    }

    #[test]
    fn unparseable_timestamp_becomes_none() {
        let record = normalize_record(
            &raw(json!({"ad_id": "m8", "ad_delivery_start_time": "soon"})),
            stamp(),
        )
        .unwrap();
        assert_eq!(record.ad_delivery_start_time, None);
    }

    #[test]
    fn creative_bodies_array_contributes_first_entry() {
        let record = normalize_record(
            &raw(json!({"ad_id": "m9", "ad_creative_bodies": ["First body", "Second body"]})),
            stamp(),
        )
        .unwrap();
        assert_eq!(record.ad_creative_body.as_deref(), Some("First body"));
    }

    #[test]
    fn normalization_is_deterministic_for_fixed_input() {
        let raws = vec![
            raw(json!({"ad_id": "a", "impressions": 10})),
            raw(json!({"ad_id": "b", "spend": "12.5"})),
        ];
        let first = normalize_all(&raws, stamp());
        let second = normalize_all(&raws, stamp());
        assert_eq!(first.records, second.records);
    }
}
