pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod feasibility;
pub mod geo;
pub mod interactive;
pub mod models;
pub mod render;
pub mod server;
pub mod service;
pub mod session;
pub mod transport;

use std::sync::Arc;

use crate::analysis::GeminiAnalyst;
use crate::config::Config;
use crate::discovery::GeminiDiscovery;
use crate::error::Result;
use crate::service::RealityCheckService;
use crate::transport::{GeminiTransport, Transport};

/// Wire the Gemini-backed discovery and analysis stages into one service.
///
/// Fails when the rider model is unusable or the transport cannot be built,
/// most often because no API key is configured.
pub fn build_service(cfg: &Config) -> Result<RealityCheckService> {
    cfg.feasibility.validate()?;
    let transport = Arc::new(GeminiTransport::new(&cfg.gemini)?);

    let discovery = GeminiDiscovery::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cfg.gemini.discovery_model.clone(),
        cfg.feasibility,
    );

    let analyst = GeminiAnalyst::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cfg.gemini.analysis_model.clone(),
    );

    Ok(RealityCheckService::new(Arc::new(discovery), Arc::new(analyst)))
}
