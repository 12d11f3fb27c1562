use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{PipelineError, Result};
use crate::schema::SourceKind;

use super::AdSource;

/// Fields requested from the ad-archive endpoint.
const DEFAULT_FIELDS: [&str; 9] = [
    "id",
    "page_name",
    "ad_creative_bodies",
    "ad_creation_time",
    "ad_delivery_start_time",
    "ad_delivery_stop_time",
    "languages",
    "impressions",
    "spend",
];

/// Live source backed by the public ad-archive HTTP API.
///
/// Requests carry a bounded timeout and follow `paging.next` cursors up to
/// the configured page limit. Every transport or protocol failure surfaces
/// as `SourceUnavailable`; retry policy belongs to the orchestrator, not
/// this client.
pub struct AdLibraryClient {
    config: ApiConfig,
    access_token: String,
    client: reqwest::Client,
}

impl AdLibraryClient {
    pub fn new(config: ApiConfig, access_token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::SourceUnavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            access_token,
            client,
        })
    }

    fn build_params(&self) -> Vec<(String, String)> {
        vec![
            ("access_token".to_string(), self.access_token.clone()),
            ("search_terms".to_string(), self.config.search_terms.clone()),
            (
                "ad_reached_countries".to_string(),
                serde_json::to_string(&self.config.countries).unwrap_or_default(),
            ),
            ("fields".to_string(), DEFAULT_FIELDS.join(",")),
        ]
    }

    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(source_error_message(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::SourceUnavailable(format!(
                "ad archive returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("unreadable API response: {}", e)))
    }
}

fn source_error_message(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

#[async_trait]
impl AdSource for AdLibraryClient {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self) -> Result<Vec<Map<String, Value>>> {
        info!("Starting ad archive extraction from {}", self.config.base_url);

        let mut ads: Vec<Map<String, Value>> = Vec::new();
        let mut next_url: Option<String> = None;

        for page in 0..self.config.page_limit {
            let request = match &next_url {
                Some(url) => self.client.get(url),
                None => self
                    .client
                    .get(&self.config.base_url)
                    .query(&self.build_params()),
            };

            let body = self.fetch_page(request).await?;

            let page_ads = body
                .get("data")
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_object())
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            debug!("Page {} returned {} ads", page + 1, page_ads.len());
            ads.extend(page_ads);

            next_url = body
                .get("paging")
                .and_then(|p| p.get("next"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            if next_url.is_none() {
                break;
            }
        }

        if next_url.is_some() {
            warn!(
                "Stopped after {} pages with more results available",
                self.config.page_limit
            );
        }

        info!("Received {} ads from ad archive", ads.len());
        Ok(ads)
    }
}
