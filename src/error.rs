use thiserror::Error;

use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum RealityCheckError {
    #[error("Failed to reach Gemini API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode model output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RealityCheckError>;
