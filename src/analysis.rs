use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{RealityCheckError, Result};
use crate::models::{
    AnalysisResponse, Content, DeliveryEstimate, GenerateContentRequest, GenerationConfig,
};
use crate::transport::Transport;

#[cfg(test)]
use mockall::automock;

pub const NO_STORES_SUMMARY: &str = "Google Maps could not pinpoint specific dark stores listed publicly near this location. However, delivery might still be available from further hubs.";
pub const NO_STORES_RISKS: [&str; 2] = [
    "Hidden/Unlisted dark stores",
    "Potential long-distance routing",
];
pub const UNAVAILABLE_SUMMARY: &str = "Analysis unavailable.";

/// Canned response when discovery found nothing to analyse.
pub fn no_stores_analysis() -> AnalysisResponse {
    AnalysisResponse {
        summary: NO_STORES_SUMMARY.to_string(),
        risk_factors: NO_STORES_RISKS.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn unavailable_analysis() -> AnalysisResponse {
    AnalysisResponse {
        summary: UNAVAILABLE_SUMMARY.to_string(),
        risk_factors: Vec::new(),
    }
}

/// Narrative summary and risk factors for one search. Never fails.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeasibilityAnalyst: Send + Sync {
    async fn analyze(&self, location: &str, estimates: &[DeliveryEstimate]) -> AnalysisResponse;
}

pub struct GeminiAnalyst {
    tx: Arc<dyn Transport>,
    model: String,
}

impl GeminiAnalyst {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self { tx, model }
    }

    async fn try_analyze(
        &self,
        location: &str,
        found: &[&DeliveryEstimate],
    ) -> Result<AnalysisResponse> {
        let estimates_json = serde_json::to_string(found)?;
        let request = GenerateContentRequest {
            contents: vec![Content::user(analysis_prompt(location, &estimates_json))],
            tools: vec![],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                temperature: None,
            }),
        };

        let response = self.tx.generate(&self.model, &request).await?;
        let text = response.text().ok_or_else(|| {
            RealityCheckError::Internal("Gemini returned no text for analysis".to_string())
        })?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(raw = %text, "Analysis output is not the expected JSON");
            RealityCheckError::Decode(e)
        })
    }
}

#[async_trait]
impl FeasibilityAnalyst for GeminiAnalyst {
    async fn analyze(&self, location: &str, estimates: &[DeliveryEstimate]) -> AnalysisResponse {
        let found: Vec<&DeliveryEstimate> = estimates.iter().filter(|e| e.is_found()).collect();
        if found.is_empty() {
            tracing::info!("No stores found for {}; skipping analysis call", location);
            return no_stores_analysis();
        }

        tracing::info!(
            "Analyzing {} found stores for location: {}",
            found.len(),
            location
        );
        match self.try_analyze(location, &found).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Feasibility analysis failed: {}", e);
                unavailable_analysis()
            }
        }
    }
}

pub fn analysis_prompt(location: &str, estimates_json: &str) -> String {
    format!(
        r#"Analyze these delivery logistics for a user at "{location}".
Data: {estimates_json}

Context: <10m is Highly Feasible, 10-15m Borderline, >15m Unlikely.

Task:
1. Summary (max 60 words): Is 10-min delivery realistic?
2. 3 Risk Factors.

Output JSON: {{ "summary": string, "riskFactors": string[] }}"#
    )
}
