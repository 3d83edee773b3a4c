//! Distance to door-step time, and the three delivery tiers.

use serde::{Deserialize, Serialize};

use crate::error::{RealityCheckError, Result};
use crate::models::Feasibility;

/// Below this many minutes a 10-minute promise is realistic.
pub const HIGHLY_FEASIBLE_BELOW_MIN: u32 = 10;
/// Up to and including this many minutes the promise is borderline.
pub const BORDERLINE_UP_TO_MIN: u32 = 15;
/// No neighbourhood hub is further than this; larger distances are model noise.
pub const MAX_HUB_DISTANCE_KM: f64 = 500.0;

/// Linear rider model: constant speed plus a fixed hand-off overhead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelModel {
    /// Conservative urban average including traffic.
    pub avg_speed_kmph: f64,
    /// Time to park and reach the customer's door.
    pub overhead_min: f64,
}

impl Default for TravelModel {
    fn default() -> Self {
        Self {
            avg_speed_kmph: 20.0,
            overhead_min: 2.0,
        }
    }
}

impl TravelModel {
    /// Speed must be positive and finite, overhead finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if !(self.avg_speed_kmph.is_finite() && self.avg_speed_kmph > 0.0) {
            return Err(RealityCheckError::Config(format!(
                "feasibility.avg_speed_kmph must be a positive number, got {}",
                self.avg_speed_kmph
            )));
        }
        if !(self.overhead_min.is_finite() && self.overhead_min >= 0.0) {
            return Err(RealityCheckError::Config(format!(
                "feasibility.overhead_min cannot be negative, got {}",
                self.overhead_min
            )));
        }
        Ok(())
    }

    /// Rounded total minutes for a distance accepted by [`is_valid_distance`].
    /// Saturates at `u32::MAX` rather than wrapping.
    pub fn travel_minutes(&self, distance_km: f64) -> u32 {
        debug_assert!(is_valid_distance(distance_km));
        let minutes = distance_km / self.avg_speed_kmph * 60.0 + self.overhead_min;
        minutes.round().clamp(0.0, f64::from(u32::MAX)) as u32
    }

    pub fn estimate(&self, distance_km: f64) -> (u32, Feasibility) {
        let minutes = self.travel_minutes(distance_km);
        (minutes, classify(minutes))
    }
}

pub fn classify(minutes: u32) -> Feasibility {
    if minutes < HIGHLY_FEASIBLE_BELOW_MIN {
        Feasibility::HighlyFeasible
    } else if minutes <= BORDERLINE_UP_TO_MIN {
        Feasibility::Borderline
    } else {
        Feasibility::Unlikely
    }
}

/// Callers must check this before handing a distance to [`TravelModel`].
pub fn is_valid_distance(distance_km: f64) -> bool {
    distance_km.is_finite() && (0.0..=MAX_HUB_DISTANCE_KM).contains(&distance_km)
}
