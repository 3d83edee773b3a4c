use colored::*;

use super::{
    ANALYSIS_LOADING, ANALYSIS_TITLE, APP_TITLE, CHART_TITLE, ChartModel, DISCLAIMER,
    HERO_HEADLINE, LOADING_DETAIL, LOADING_TITLE, NO_DATA_MESSAGE, NOT_FOUND_DETAIL,
    NOT_FOUND_TITLE, REFERENCE_LABEL, RISKS_TITLE, Tone, chart_model, format_km, hex_rgb,
};
use crate::models::{AnalysisResponse, DeliveryEstimate, SimulationResult, is_web_link};
use crate::session::{AnalysisState, ViewState};

/// Columns available to the longest bar.
const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 18;

/// Full-screen rendering of one snapshot.
pub fn render(state: &ViewState) -> String {
    let mut out = header();
    match state {
        ViewState::Idle => out.push_str(&idle()),
        ViewState::Loading { label } => out.push_str(&loading(label)),
        ViewState::Results {
            simulation,
            analysis,
        } => {
            out.push_str(&results(simulation));
            out.push_str(&analysis_card(analysis));
            out.push('\n');
            out.push_str(&format!("{}\n", DISCLAIMER.dimmed()));
        }
        ViewState::Error { message, retry } => {
            out.push_str(&idle());
            out.push_str(&format!("\n{} {}\n", "✖".bright_red(), message.red()));
            if retry.is_some() {
                out.push_str(&format!("  {}\n", "Press Enter to retry.".dimmed()));
            }
        }
    }
    out
}

fn header() -> String {
    format!("{} {}\n\n", "⚡".bright_yellow(), APP_TITLE.bold())
}

fn idle() -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", HERO_HEADLINE.bold().bright_white()));
    out.push_str(&format!(
        "{}\n",
        "We search live listings for nearby dark stores of Zepto, Blinkit and Swiggy Instamart and check whether a rider can physically make it in 10 minutes."
            .dimmed()
    ));
    out.push_str(&format!(
        "\n{} {}\n",
        "→".cyan(),
        "Enter a locality, landmark or address. Prefix with @ to search from coordinates (@12.91, 77.63)."
    ));
    out
}

fn loading(label: &str) -> String {
    format!(
        "{}\n{}\n{} {}\n",
        LOADING_TITLE.bold(),
        LOADING_DETAIL.dimmed(),
        "Area:".dimmed(),
        label
    )
}

/// Cards and chart for a finished search; the analysis is rendered separately.
pub fn results(simulation: &SimulationResult) -> String {
    let mut out = format!(
        "{}  {} {}\n\n",
        "Search Results".bold(),
        "Area:".dimmed(),
        simulation.address_label.bright_white()
    );

    if simulation.estimates.is_empty() {
        out.push_str(&format!("{}\n\n", NO_DATA_MESSAGE.dimmed()));
    }
    for estimate in &simulation.estimates {
        out.push_str(&card(estimate));
        out.push('\n');
    }

    if let Some(chart) = chart_model(simulation) {
        out.push_str(&bar_chart(&chart));
        out.push('\n');
    }
    out
}

fn card(estimate: &DeliveryEstimate) -> String {
    let (r, g, b) = hex_rgb(estimate.color());
    let mut out = format!(
        "{} {}\n",
        "●".truecolor(r, g, b),
        estimate.platform().name().bold()
    );

    if !estimate.is_found() {
        out.push_str(&format!("  {}\n", NOT_FOUND_TITLE.dimmed()));
        out.push_str(&format!("  {}\n", NOT_FOUND_DETAIL.dimmed()));
        return out;
    }

    let minutes = format!("{} mins", estimate.travel_minutes());
    out.push_str(&format!(
        "  {}  {}  {}\n",
        toned(&minutes, estimate.feasibility().into()).bold(),
        toned(estimate.feasibility().label(), estimate.feasibility().into()),
        format!("(~{} km drive)", format_km(estimate.distance_km())).dimmed()
    ));
    out.push_str(&format!(
        "  {} {}\n",
        "Found Location:".dimmed(),
        estimate.store_name()
    ));
    out.push_str(&format!(
        "  {}\n",
        estimate.store_address().unwrap_or("N/A").dimmed()
    ));
    if let Some(link) = estimate.evidence_link().filter(|l| is_web_link(l)) {
        out.push_str(&format!("  {} {}\n", "Verify Source:".cyan(), link.underline()));
    }
    out
}

fn toned(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Good => text.green(),
        Tone::Warn => text.yellow(),
        Tone::Bad => text.red(),
        Tone::Muted => text.dimmed(),
    }
}

/// Horizontal bars with a `│` marker in the reference column.
pub fn bar_chart(chart: &ChartModel) -> String {
    let reference_col = scaled(chart.reference_fraction);
    let mut out = format!("{}\n", CHART_TITLE.bold());

    out.push_str(&format!(
        "{:width$} {}{}\n",
        "",
        " ".repeat(reference_col),
        format!("▼ {REFERENCE_LABEL}").red(),
        width = LABEL_WIDTH
    ));

    for bar in &chart.bars {
        let (r, g, b) = hex_rgb(&bar.color);
        let filled = scaled(bar.fraction).max(1);
        let mut row = String::new();
        for col in 0..BAR_WIDTH {
            let cell = if col == reference_col {
                "│".red().to_string()
            } else if col < filled {
                "█".truecolor(r, g, b).to_string()
            } else {
                " ".to_string()
            };
            row.push_str(&cell);
        }
        out.push_str(&format!(
            "{:<width$} {} {}\n",
            bar.platform.name(),
            row,
            format!("{} min", bar.minutes).dimmed(),
            width = LABEL_WIDTH
        ));
    }

    out.push_str(&format!(
        "{:width$} {}\n",
        "",
        format!("0{:>w$}", format!("{} min", chart.axis_max_min), w = BAR_WIDTH - 1).dimmed(),
        width = LABEL_WIDTH
    ));
    out
}

fn scaled(fraction: f64) -> usize {
    let col = (fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    col.min(BAR_WIDTH - 1)
}

pub fn analysis_card(analysis: &AnalysisState) -> String {
    let mut out = format!("{} {}\n", "✦".bright_magenta(), ANALYSIS_TITLE.bold());
    match analysis {
        AnalysisState::Pending => {
            out.push_str(&format!("  {}\n", ANALYSIS_LOADING.dimmed()));
        }
        AnalysisState::Ready(response) => out.push_str(&analysis_body(response)),
    }
    out
}

fn analysis_body(response: &AnalysisResponse) -> String {
    let mut out = format!("  {}\n", response.summary);
    if !response.risk_factors.is_empty() {
        out.push_str(&format!("\n  {}\n", RISKS_TITLE.bright_red().bold()));
        for risk in &response.risk_factors {
            out.push_str(&format!("   {} {}\n", "•".red(), risk));
        }
    }
    out
}
