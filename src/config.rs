use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::feasibility::TravelModel;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

/// Main configuration structure for the reality check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub feasibility: TravelModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Optional bearer token required on every route except /health
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub discovery_model: String,
    pub analysis_model: String,
    /// Unset means the HTTP client's own default
    pub timeout_seconds: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            discovery_model: DEFAULT_GEMINI_MODEL.to_string(),
            analysis_model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_seconds: None,
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != PLACEHOLDER_API_KEY
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gemini: GeminiConfig::default(),
            feasibility: TravelModel::default(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env from: {}", path.display()),
            Err(_) => tracing::debug!("No .env file found - continuing with env vars only"),
        }

        let config_path = env::var("QC_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::from_file(Path::new(&config_path));

        config.apply_overrides(|key| env::var(key).ok());

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {} - using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from an environment-like lookup
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(bind) = lookup("QC_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = lookup("QC_BEARER_TOKEN") {
            self.server.bearer_token = Some(token).filter(|t| !t.is_empty());
        }

        // Gemini overrides
        if let Some(api_key) = lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")) {
            self.gemini.api_key = api_key;
        }
        if let Some(api_base) = lookup("QC_GEMINI_API_BASE") {
            self.gemini.api_base = api_base;
        }
        if let Some(model) = lookup("QC_GEMINI_MODEL") {
            self.gemini.discovery_model = model.clone();
            self.gemini.analysis_model = model;
        }
        if let Some(timeout) = lookup("QC_GEMINI_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.gemini.timeout_seconds = Some(secs);
            }
        }

        // Rider model overrides
        if let Some(speed) = lookup("QC_RIDER_SPEED_KMPH") {
            if let Ok(v) = speed.parse() {
                self.feasibility.avg_speed_kmph = v;
            }
        }
        if let Some(overhead) = lookup("QC_OVERHEAD_MIN") {
            if let Ok(v) = overhead.parse() {
                self.feasibility.overhead_min = v;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.gemini.has_api_key() {
            return Err("GEMINI_API_KEY environment variable must be set".into());
        }
        self.feasibility.validate()?;
        if self.gemini.timeout_seconds == Some(0) {
            return Err("gemini.timeout_seconds cannot be 0".into());
        }
        Ok(())
    }
}
