use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance tag injected by the extractor into every bronze record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mock,
    Api,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Mock => write!(f, "mock"),
            SourceKind::Api => write!(f, "api"),
        }
    }
}

/// Bronze-layer record: the untyped source payload plus provenance metadata.
///
/// No schema constraints are applied here; the payload may be missing fields
/// or carry extras. Untyped data never flows past the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAdRecord {
    pub source: SourceKind,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_data: serde_json::Map<String, serde_json::Value>,
}

/// Silver-layer record with the canonical field set.
///
/// `ad_id` is required and non-empty; everything else degrades to a default
/// or `None` when the source value is absent or malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAdRecord {
    pub ad_id: String,
    pub page_name: String,
    pub ad_creative_body: Option<String>,
    pub ad_creation_time: Option<DateTime<Utc>>,
    pub ad_delivery_start_time: Option<DateTime<Utc>>,
    pub ad_delivery_stop_time: Option<DateTime<Utc>>,
    pub has_image: bool,
    pub has_video: bool,
    pub languages: Vec<String>,
    pub impressions_lower: Option<u64>,
    pub impressions_upper: Option<u64>,
    pub spend_lower: Option<f64>,
    pub spend_upper: Option<f64>,
    pub normalized_at: DateTime<Utc>,
}

/// Media classification derived from the normalized media flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "video-only")]
    VideoOnly,
    #[serde(rename = "image-only")]
    ImageOnly,
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "none")]
    None,
}

impl MediaType {
    /// Total mapping from the media flags; every flag combination has a class.
    pub fn from_flags(has_image: bool, has_video: bool) -> Self {
        match (has_image, has_video) {
            (true, true) => MediaType::Both,
            (false, true) => MediaType::VideoOnly,
            (true, false) => MediaType::ImageOnly,
            (false, false) => MediaType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::VideoOnly => "video-only",
            MediaType::ImageOnly => "image-only",
            MediaType::Both => "both",
            MediaType::None => "none",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gold-layer record: the normalized fields plus the derived attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedAdRecord {
    #[serde(flatten)]
    pub ad: NormalizedAdRecord,
    pub duration_hours: f64,
    pub media_type: MediaType,
    pub language: String,
    pub enriched_at: DateTime<Utc>,
}

/// One entry of the terminal ranked artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RankedAd {
    pub ad: EnrichedAdRecord,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_covers_all_flag_combinations() {
        assert_eq!(MediaType::from_flags(true, true), MediaType::Both);
        assert_eq!(MediaType::from_flags(false, true), MediaType::VideoOnly);
        assert_eq!(MediaType::from_flags(true, false), MediaType::ImageOnly);
        assert_eq!(MediaType::from_flags(false, false), MediaType::None);
    }

    #[test]
    fn media_type_serializes_with_hyphenated_names() {
        assert_eq!(
            serde_json::to_string(&MediaType::VideoOnly).unwrap(),
            "\"video-only\""
        );
        assert_eq!(serde_json::to_string(&MediaType::None).unwrap(), "\"none\"");
    }

    #[test]
    fn raw_record_tolerates_missing_payload() {
        let raw: RawAdRecord = serde_json::from_str(
            r#"{"source":"mock","ingested_at":"2025-06-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(raw.source, SourceKind::Mock);
        assert!(raw.raw_data.is_empty());
    }
}
