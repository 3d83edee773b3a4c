//! Presentation of session snapshots. Everything here is a pure function of
//! the snapshot it is given.

pub mod html;
pub mod terminal;

use crate::feasibility::HIGHLY_FEASIBLE_BELOW_MIN;
use crate::models::{DeliveryEstimate, Feasibility, Platform, SimulationResult};

pub const APP_TITLE: &str = "Q-Commerce Reality Check";
pub const HERO_HEADLINE: &str = "Is that 10-minute promise realistic?";
pub const CHART_TITLE: &str = "Estimated Travel Time vs. 10m Promise";
pub const REFERENCE_LABEL: &str = "10 min limit";
pub const LOADING_TITLE: &str = "Searching the real world...";
pub const LOADING_DETAIL: &str = "Locating fulfillment centers and calculating distances.";
pub const ANALYSIS_LOADING: &str = "Generating Reality Check...";
pub const ANALYSIS_TITLE: &str = "AI Reality Check";
pub const RISKS_TITLE: &str = "Potential Risks";
pub const NOT_FOUND_TITLE: &str = "No verified hub found.";
pub const NOT_FOUND_DETAIL: &str = "Could not locate a listed dark store near this location.";
pub const NO_DATA_MESSAGE: &str = "No store data came back for this location.";
pub const DISCLAIMER: &str = "Results are based on live web search of public listings. Companies may operate undisclosed dark stores not visible here.";

/// Extra axis room past the slowest bar, in minutes.
const CHART_HEADROOM_MIN: u32 = 10;

/// How a tier is colour-coded on every surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warn,
    Bad,
    Muted,
}

impl From<Feasibility> for Tone {
    fn from(f: Feasibility) -> Self {
        match f {
            Feasibility::HighlyFeasible => Tone::Good,
            Feasibility::Borderline => Tone::Warn,
            Feasibility::Unlikely => Tone::Bad,
            Feasibility::Unknown => Tone::Muted,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub platform: Platform,
    pub minutes: u32,
    pub distance_km: f64,
    pub feasibility: Feasibility,
    pub color: String,
    /// Share of the axis this bar covers, 0.0..=1.0
    pub fraction: f64,
}

/// Horizontal bars of travel time with the 10-minute reference line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartModel {
    pub bars: Vec<ChartBar>,
    pub axis_max_min: u32,
    pub reference_min: u32,
    pub reference_fraction: f64,
}

/// Only platforms with a found store are charted; `None` when there are none.
pub fn chart_model(simulation: &SimulationResult) -> Option<ChartModel> {
    let found: Vec<&DeliveryEstimate> = simulation.found_estimates().collect();
    let slowest = found.iter().map(|e| e.travel_minutes()).max()?;
    let axis_max_min = slowest.saturating_add(CHART_HEADROOM_MIN);
    let axis = f64::from(axis_max_min);

    let bars = found
        .iter()
        .map(|e| ChartBar {
            platform: e.platform(),
            minutes: e.travel_minutes(),
            distance_km: e.distance_km(),
            feasibility: e.feasibility(),
            color: e.color().to_string(),
            fraction: f64::from(e.travel_minutes()) / axis,
        })
        .collect();

    Some(ChartModel {
        bars,
        axis_max_min,
        reference_min: HIGHLY_FEASIBLE_BELOW_MIN,
        reference_fraction: f64::from(HIGHLY_FEASIBLE_BELOW_MIN) / axis,
    })
}

/// `#rrggbb` to components, grey for anything unparseable.
pub(crate) fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let digits = hex.trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => (r, g, b),
        _ => (0xcb, 0xd5, 0xe1),
    }
}

/// Distances print the way the model reported them: no trailing zeros.
pub(crate) fn format_km(km: f64) -> String {
    let rounded = (km * 100.0).round() / 100.0;
    format!("{rounded}")
}
