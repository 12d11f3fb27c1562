use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::MockConfig;
use crate::error::Result;
use crate::schema::SourceKind;

use super::AdSource;

/// Content templates for generating realistic mock data.
const AD_TITLES: [&str; 5] = [
    "Boost your microlearning today!",
    "Master a new skill in 5 minutes",
    "Learn smarter, not harder",
    "Microlearning for busy people",
    "Upgrade your brain",
];

const AD_BODIES: [&str; 5] = [
    "This ad teaches you microlearning techniques.",
    "Daily micro lessons to improve focus.",
    "Become better every day with microlearning.",
    "Microlearning is the future of education.",
    "Quick tips, big impact with microlearning.",
];

const LANGUAGE_SETS: [&[&str]; 4] = [&["en"], &["uk"], &["en", "es"], &[]];

/// Synthetic source spanning the full field space so every downstream path
/// can be exercised without live credentials.
///
/// Deterministic under a fixed seed. Batches of at least eight records
/// include the awkward cases: a record with no media information, one whose
/// delivery window is zero, one with digit-only text, one missing its
/// `ad_id`, and one duplicating the first record's id.
pub struct MockAdSource {
    config: MockConfig,
}

impl MockAdSource {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    fn generate(&self) -> Vec<Map<String, Value>> {
        let mut rng: StdRng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let base_time = Utc::now();
        let count = self.config.count;

        let mut ads: Vec<Map<String, Value>> =
            (0..count).map(|i| generate_ad(i, base_time, &mut rng)).collect();

        if count >= 8 {
            // Force the edge cases the downstream stages must cope with
            let zero_duration_idx = count / 2;
            if let Some(start) = ads[zero_duration_idx]
                .get("ad_delivery_start_time")
                .cloned()
            {
                ads[zero_duration_idx].insert("ad_delivery_stop_time".to_string(), start);
            }

            let numeric_idx = count / 3;
            ads[numeric_idx].insert(
                "ad_creative_body".to_string(),
                json!("4711 0815 1234 5678"),
            );
            ads[numeric_idx].insert("page_name".to_string(), json!("90210"));

            let bare_media_idx = count / 4;
            ads[bare_media_idx].remove("has_image");
            ads[bare_media_idx].remove("has_video");
            ads[bare_media_idx].remove("media");

            ads[count - 2].remove("ad_id");
            ads[count - 1].insert("ad_id".to_string(), json!("mock_0"));
            debug!("Injected edge-case records into mock batch");
        }

        ads
    }
}

fn generate_ad(index: usize, base_time: DateTime<Utc>, rng: &mut StdRng) -> Map<String, Value> {
    let creation_time = base_time - Duration::days(rng.gen_range(30..90));
    let start_time = base_time - Duration::days(rng.gen_range(1..30));
    let stop_time = start_time + Duration::hours(rng.gen_range(1..120));

    let has_image = rng.gen_bool(0.6);
    let has_video = rng.gen_bool(0.4);
    let languages = LANGUAGE_SETS[rng.gen_range(0..LANGUAGE_SETS.len())];

    let mut ad = json!({
        "ad_id": format!("mock_{}", index),
        "page_id": format!("page_{}", 1000 + index),
        "page_name": format!("Mock Page {}", index),
        "ad_creative_link_title": AD_TITLES[rng.gen_range(0..AD_TITLES.len())],
        "ad_creative_body": AD_BODIES[rng.gen_range(0..AD_BODIES.len())],
        "ad_creation_time": creation_time.to_rfc3339(),
        "ad_delivery_start_time": start_time.to_rfc3339(),
        "ad_delivery_stop_time": stop_time.to_rfc3339(),
        "ad_snapshot_url": format!("https://facebook.com/ads/snapshot/mock_{}", index),
        "currency": "USD",
        "languages": languages,
        "has_image": has_image,
        "has_video": has_video,
    });
    let map = ad.as_object_mut().expect("literal object");

    // Alternate between scalar metrics and Ad-Library-style bounds objects
    // so the normalizer's coercions see both shapes
    if index % 2 == 0 {
        map.insert("impressions".to_string(), json!(rng.gen_range(1000..50000)));
        map.insert(
            "spend".to_string(),
            json!((rng.gen_range(5.0..500.0) * 100.0_f64).round() / 100.0),
        );
    } else {
        let impressions_lower = rng.gen_range(1000..25000);
        let spend_lower = rng.gen_range(5..250);
        map.insert(
            "impressions".to_string(),
            json!({
                "lower_bound": impressions_lower.to_string(),
                "upper_bound": (impressions_lower * 2).to_string(),
            }),
        );
        map.insert(
            "spend".to_string(),
            json!({
                "lower_bound": spend_lower.to_string(),
                "upper_bound": (spend_lower * 2).to_string(),
            }),
        );
    }

    map.clone()
}

#[async_trait]
impl AdSource for MockAdSource {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Mock
    }

    async fn fetch(&self) -> Result<Vec<Map<String, Value>>> {
        info!("Generating {} mock ads", self.config.count);
        Ok(self.generate())
    }
}
