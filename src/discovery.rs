use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::feasibility::{TravelModel, is_valid_distance};
use crate::models::{
    Content, DeliveryEstimate, GenerateContentRequest, GroundingChunk, Platform, StoreListing,
    Tool, is_web_link,
};
use crate::transport::Transport;

#[cfg(test)]
use mockall::automock;

/// Finds the nearest listed hub of every platform around a location.
///
/// Implementations never fail: anything that goes wrong yields an empty list,
/// which callers render as "no stores found".
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoreDiscovery: Send + Sync {
    async fn discover(&self, location_query: &str) -> Vec<DeliveryEstimate>;
}

pub struct GeminiDiscovery {
    tx: Arc<dyn Transport>,
    model: String,
    travel: TravelModel,
}

impl GeminiDiscovery {
    pub fn new(tx: Arc<dyn Transport>, model: String, travel: TravelModel) -> Self {
        Self { tx, model, travel }
    }

    async fn try_discover(&self, location_query: &str) -> Result<Vec<DeliveryEstimate>> {
        // responseMimeType is not allowed together with the googleMaps tool,
        // so the JSON comes back embedded in free text.
        let request = GenerateContentRequest {
            contents: vec![Content::user(discovery_prompt(location_query))],
            tools: vec![Tool::google_maps()],
            generation_config: None,
        };

        let response = self.tx.generate(&self.model, &request).await?;
        let text = response.text().unwrap_or_else(|| "[]".to_string());

        let listings = parse_store_array(&text);
        let evidence = match_evidence(response.grounding_chunks());
        tracing::info!(
            listings = listings.len(),
            citations = evidence.len(),
            "Parsed store discovery response"
        );

        Ok(build_estimates(&listings, &evidence, &self.travel))
    }
}

#[async_trait]
impl StoreDiscovery for GeminiDiscovery {
    async fn discover(&self, location_query: &str) -> Vec<DeliveryEstimate> {
        tracing::info!("Discovering stores near: {}", location_query);
        match self.try_discover(location_query).await {
            Ok(estimates) => estimates,
            Err(e) => {
                tracing::error!("Store discovery failed: {}", e);
                Vec::new()
            }
        }
    }
}

pub fn discovery_prompt(location_query: &str) -> String {
    format!(
        r#"You are a geospatial analyst.
User Location: "{location_query}"

Task: Find the nearest operating location for EACH of these Quick Commerce platforms relative to the User Location:
1. Zepto
2. Blinkit
3. Swiggy Instamart

Use Google Maps to find these specific business listings. Look for terms like "Zepto", "Blinkit Store", "Swiggy Instamart", "Instamart", or "Grocery Delivery Hub".

For each platform:
1. Identify the nearest location found on Maps.
2. Calculate/Estimate the driving distance (in KM) from "{location_query}" to that store.

Output strictly a valid JSON array string. Do not use Markdown code blocks.
Schema:
[
  {{
    "platform": "Zepto",
    "found": true,
    "storeName": "Name from Maps",
    "storeAddress": "Address from Maps",
    "distanceKm": 1.5
  }}
]

If a platform is not found nearby, set "found": false and "distanceKm": 0."#
    )
}

/// Pull the store array out of free-form model output.
///
/// Takes everything from the first `[` to the last `]`, so prose and code
/// fences around the array are ignored. Returns an empty list when there is
/// no array or it does not parse; elements with the wrong shape are skipped.
pub fn parse_store_array(text: &str) -> Vec<StoreListing> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        tracing::warn!("No JSON array found in discovery response");
        return Vec::new();
    };
    if end < start {
        tracing::warn!("No JSON array found in discovery response");
        return Vec::new();
    }

    let values: Vec<serde_json::Value> = match serde_json::from_str(&text[start..=end]) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Failed to parse discovery array: {}", e);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<StoreListing>(v) {
            Ok(listing) => Some(listing),
            Err(e) => {
                tracing::debug!("Skipping malformed store listing: {}", e);
                None
            }
        })
        .collect()
}

/// Associate http(s) citation URIs with platforms by title keyword; first match wins.
pub fn match_evidence(chunks: &[GroundingChunk]) -> HashMap<Platform, String> {
    let mut evidence = HashMap::new();

    for source in chunks.iter().filter_map(GroundingChunk::source) {
        let Some(uri) = source.uri.as_deref().filter(|u| is_web_link(u)) else {
            continue;
        };
        let title = source.title.as_deref().unwrap_or_default().to_lowercase();

        for platform in Platform::ALL {
            if platform.title_keywords().iter().any(|k| title.contains(k)) {
                evidence.entry(platform).or_insert_with(|| uri.to_string());
            }
        }
    }

    evidence
}

/// One estimate per platform, in fixed platform order.
pub fn build_estimates(
    listings: &[StoreListing],
    evidence: &HashMap<Platform, String>,
    travel: &TravelModel,
) -> Vec<DeliveryEstimate> {
    Platform::ALL
        .iter()
        .map(|&platform| {
            let listing = listings
                .iter()
                .find(|l| l.found && l.platform == platform.name());

            let Some(listing) = listing else {
                return DeliveryEstimate::not_found(platform);
            };

            let distance_km = listing.distance_km.unwrap_or(0.0);
            if !is_valid_distance(distance_km) {
                tracing::warn!(
                    "Ignoring {} listing with invalid distance {}",
                    platform,
                    distance_km
                );
                return DeliveryEstimate::not_found(platform);
            }

            DeliveryEstimate::found(
                platform,
                listing.store_name.clone().unwrap_or_default(),
                listing.store_address.clone(),
                distance_km,
                travel.travel_minutes(distance_km),
                evidence.get(&platform).cloned(),
            )
        })
        .collect()
}
