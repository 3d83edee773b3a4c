use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::geo::Coordinates;

/// Neutral grey used for platforms with no listed hub.
pub const NOT_FOUND_COLOR: &str = "#cbd5e1";
pub const NOT_FOUND_STORE_NAME: &str = "No listed hub found nearby";

// ───────────────────────────────────────────────────────────────────────────────
// Platforms and tiers
// ───────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Zepto,
    Blinkit,
    #[serde(rename = "Swiggy Instamart")]
    SwiggyInstamart,
}

impl Platform {
    /// Fixed search and display order.
    pub const ALL: [Platform; 3] = [Platform::Zepto, Platform::Blinkit, Platform::SwiggyInstamart];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Zepto => "Zepto",
            Platform::Blinkit => "Blinkit",
            Platform::SwiggyInstamart => "Swiggy Instamart",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Platform::Zepto => "#9333ea",
            Platform::Blinkit => "#facc15",
            Platform::SwiggyInstamart => "#f97316",
        }
    }

    /// Lowercase fragments that identify this platform in a citation title.
    pub fn title_keywords(&self) -> &'static [&'static str] {
        match self {
            Platform::Zepto => &["zepto"],
            Platform::Blinkit => &["blinkit"],
            Platform::SwiggyInstamart => &["swiggy", "instamart"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feasibility {
    #[serde(rename = "Highly Feasible")]
    HighlyFeasible,
    Borderline,
    Unlikely,
    Unknown,
}

impl Feasibility {
    pub fn label(&self) -> &'static str {
        match self {
            Feasibility::HighlyFeasible => "Highly Feasible",
            Feasibility::Borderline => "Borderline",
            Feasibility::Unlikely => "Unlikely",
            Feasibility::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateSource {
    #[serde(rename = "Live Search")]
    LiveSearch,
    #[serde(rename = "Not Found")]
    NotFound,
}

// ───────────────────────────────────────────────────────────────────────────────
// Search results
// ───────────────────────────────────────────────────────────────────────────────

/// One platform's result for one search.
///
/// Fields are private so the feasibility tier can only come out of
/// [`DeliveryEstimate::found`], which derives it from the travel time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEstimate {
    platform: Platform,
    store_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_address: Option<String>,
    distance_km: f64,
    estimated_travel_time_min: u32,
    feasibility: Feasibility,
    color: String,
    source: EstimateSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidence_link: Option<String>,
}

impl DeliveryEstimate {
    pub fn found(
        platform: Platform,
        store_name: String,
        store_address: Option<String>,
        distance_km: f64,
        travel_minutes: u32,
        evidence_link: Option<String>,
    ) -> Self {
        Self {
            platform,
            store_name,
            store_address,
            distance_km,
            estimated_travel_time_min: travel_minutes,
            feasibility: crate::feasibility::classify(travel_minutes),
            color: platform.color().to_string(),
            source: EstimateSource::LiveSearch,
            evidence_link,
        }
    }

    pub fn not_found(platform: Platform) -> Self {
        Self {
            platform,
            store_name: NOT_FOUND_STORE_NAME.to_string(),
            store_address: None,
            distance_km: 0.0,
            estimated_travel_time_min: 0,
            feasibility: Feasibility::Unknown,
            color: NOT_FOUND_COLOR.to_string(),
            source: EstimateSource::NotFound,
            evidence_link: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn store_address(&self) -> Option<&str> {
        self.store_address.as_deref()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn travel_minutes(&self) -> u32 {
        self.estimated_travel_time_min
    }

    pub fn feasibility(&self) -> Feasibility {
        self.feasibility
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn source(&self) -> EstimateSource {
        self.source
    }

    pub fn evidence_link(&self) -> Option<&str> {
        self.evidence_link.as_deref()
    }

    pub fn is_found(&self) -> bool {
        self.source == EstimateSource::LiveSearch
    }
}

/// Only plain http(s) URLs are ever shown as evidence links.
pub fn is_web_link(uri: &str) -> bool {
    let lower = uri.trim_start().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

/// Aggregate of one search, replaced wholesale by the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub id: Uuid,
    pub user_location: Option<Coordinates>,
    pub address_label: String,
    pub estimates: Vec<DeliveryEstimate>,
    pub timestamp: DateTime<Utc>,
}

impl SimulationResult {
    pub fn new(
        user_location: Option<Coordinates>,
        address_label: String,
        estimates: Vec<DeliveryEstimate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_location,
            address_label,
            estimates,
            timestamp: Utc::now(),
        }
    }

    pub fn found_estimates(&self) -> impl Iterator<Item = &DeliveryEstimate> {
        self.estimates.iter().filter(|e| e.is_found())
    }

    pub fn any_found(&self) -> bool {
        self.estimates.iter().any(DeliveryEstimate::is_found)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub summary: String,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

// ───────────────────────────────────────────────────────────────────────────────
// Store listings reported by the model
// ───────────────────────────────────────────────────────────────────────────────

/// Distances come back as numbers most of the time, occasionally as strings.
fn deserialize_flexible_km<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleKm {
        Float(f64),
        String(String),
        Null,
    }

    match FlexibleKm::deserialize(deserializer)? {
        FlexibleKm::Float(f) => Ok(Some(f)),
        FlexibleKm::String(s) => s
            .trim()
            .trim_end_matches("km")
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        FlexibleKm::Null => Ok(None),
    }
}

/// One element of the JSON array the discovery prompt asks for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreListing {
    pub platform: String,
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub store_address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_km")]
    pub distance_km: Option<f64>,
}

// ───────────────────────────────────────────────────────────────────────────────
// Gemini generateContent wire format
// ───────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_maps: Option<serde_json::Value>,
}

impl Tool {
    pub fn google_maps() -> Self {
        Self {
            google_maps: Some(serde_json::json!({})),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it produced any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    pub fn grounding_chunks(&self) -> &[GroundingChunk] {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    pub maps: Option<GroundingSource>,
    pub web: Option<GroundingSource>,
}

impl GroundingChunk {
    /// Maps citations take precedence over web ones.
    pub fn source(&self) -> Option<&GroundingSource> {
        self.maps.as_ref().or(self.web.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_serializes_with_display_names() {
        let est = DeliveryEstimate::found(
            Platform::SwiggyInstamart,
            "Instamart HSR".to_string(),
            Some("Sector 2".to_string()),
            1.0,
            5,
            None,
        );
        let json = serde_json::to_value(&est).unwrap();
        assert_eq!(json["platform"], "Swiggy Instamart");
        assert_eq!(json["feasibility"], "Highly Feasible");
        assert_eq!(json["source"], "Live Search");
        assert_eq!(json["estimatedTravelTimeMin"], 5);
        assert!(json.get("evidenceLink").is_none());
    }

    #[test]
    fn not_found_placeholder_shape() {
        let est = DeliveryEstimate::not_found(Platform::Blinkit);
        assert_eq!(est.source(), EstimateSource::NotFound);
        assert_eq!(est.feasibility(), Feasibility::Unknown);
        assert_eq!(est.color(), NOT_FOUND_COLOR);
        assert_eq!(est.distance_km(), 0.0);
        assert_eq!(est.travel_minutes(), 0);
        assert!(est.store_address().is_none());
        assert!(!est.is_found());
    }

    #[test]
    fn listing_accepts_string_distance() {
        let listing: StoreListing = serde_json::from_str(
            r#"{"platform":"Zepto","found":true,"storeName":"Z","distanceKm":"2.5 km"}"#,
        )
        .unwrap();
        assert_eq!(listing.distance_km, Some(2.5));
        assert!(listing.store_address.is_none());
    }

    #[test]
    fn response_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[{\"a\":"},{"text":"1}]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some(r#"[{"a":1}]"#));
        assert!(resp.grounding_chunks().is_empty());
    }

    #[test]
    fn request_omits_empty_tools() {
        let req = GenerateContentRequest {
            contents: vec![Content::user("hi")],
            tools: vec![],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                temperature: None,
            }),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }
}
