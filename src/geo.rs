use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RealityCheckError, Result};

pub const DEVICE_LOCATION_LABEL: &str = "Your Coordinates";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(RealityCheckError::InvalidLocation(format!(
                "latitude {lat} is outside -90..=90"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(RealityCheckError::InvalidLocation(format!(
                "longitude {lng} is outside -180..=180"
            )));
        }
        Ok(Self { lat, lng })
    }
}

impl fmt::Display for Coordinates {
    /// Same "lat, lng" shape a browser position turns into.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

impl FromStr for Coordinates {
    type Err = RealityCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| RealityCheckError::InvalidLocation(format!("'{s}' is not 'lat, lng'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| RealityCheckError::InvalidLocation(format!("'{}': {e}", v.trim())))
        };
        Coordinates::new(parse(lat)?, parse(lng)?)
    }
}

/// Where a search starts from: typed text or a device position.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Manual(String),
    Device(Coordinates),
}

impl LocationQuery {
    /// Build from a manual entry; blank input yields `None`.
    pub fn manual(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(LocationQuery::Manual(trimmed.to_string()))
        }
    }

    /// Text sent to the discovery prompt.
    pub fn query_text(&self) -> String {
        match self {
            LocationQuery::Manual(text) => text.clone(),
            LocationQuery::Device(coords) => coords.to_string(),
        }
    }

    /// Label shown next to the results.
    pub fn label(&self) -> String {
        match self {
            LocationQuery::Manual(text) => text.clone(),
            LocationQuery::Device(_) => DEVICE_LOCATION_LABEL.to_string(),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            LocationQuery::Manual(_) => None,
            LocationQuery::Device(coords) => Some(*coords),
        }
    }
}
