use async_trait::async_trait;
use reqwest::Client;

use crate::config::GeminiConfig;
use crate::error::{RealityCheckError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

/// Single-shot `generateContent` client. Failures are returned to the caller
/// as-is; nothing here retries.
pub struct GeminiTransport {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GeminiTransport {
    pub fn new(cfg: &GeminiConfig) -> Result<Self> {
        if !cfg.has_api_key() {
            return Err(RealityCheckError::Config(
                "GEMINI_API_KEY environment variable must be set".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!(model, "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RealityCheckError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
