use super::{
    ANALYSIS_LOADING, ANALYSIS_TITLE, APP_TITLE, CHART_TITLE, ChartModel, DISCLAIMER,
    HERO_HEADLINE, LOADING_DETAIL, LOADING_TITLE, NO_DATA_MESSAGE, NOT_FOUND_DETAIL,
    NOT_FOUND_TITLE, REFERENCE_LABEL, RISKS_TITLE, Tone, chart_model, format_km,
};
use crate::geo::LocationQuery;
use crate::models::{DeliveryEstimate, SimulationResult, is_web_link};
use crate::session::{AnalysisState, GEOLOCATION_ERROR, ViewState};

const STYLE: &str = "<style>:root{--bg:#f8fafc;--card:#ffffff;--ink:#0f172a;--muted:#64748b;--line:#e2e8f0;--good:#16a34a;--warn:#ca8a04;--bad:#dc2626}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Inter\",\"Segoe UI\",sans-serif;background:var(--bg);min-height:100vh}.shell{max-width:980px;margin:0 auto;padding:20px 16px 32px}.top{display:flex;justify-content:space-between;align-items:center;margin-bottom:18px}.brand{font-weight:800;font-size:1.15rem}.hero{background:linear-gradient(135deg,#1e1b4b 0%,#4338ca 100%);color:#eef2ff;border-radius:18px;padding:28px 24px;box-shadow:0 10px 30px rgba(30,27,75,.25)}.hero h1{margin:0 0 10px;font-size:1.7rem}.hero p{margin:0 0 18px;color:#c7d2fe}.search{display:flex;gap:8px;flex-wrap:wrap}.search input{flex:1;min-width:220px;padding:11px 12px;border-radius:10px;border:0;font-size:.95rem}.btn{padding:10px 14px;border-radius:10px;border:1px solid rgba(0,0,0,.1);font-weight:700;font-size:.85rem;cursor:pointer;text-decoration:none;display:inline-block}.btn-primary{background:#facc15;color:#1e1b4b}.btn-ghost{background:rgba(255,255,255,.12);color:#eef2ff}.btn-link{background:#eef2ff;color:#312e81}.error{margin-top:14px;background:#fef2f2;color:#991b1b;border:1px solid #fecaca;border-radius:10px;padding:10px 12px;font-size:.9rem}.geo-error{display:none}.grid{display:grid;grid-template-columns:repeat(3,minmax(0,1fr));gap:12px;margin-top:14px}.card{background:var(--card);border:1px solid var(--line);border-radius:14px;padding:14px;box-shadow:0 6px 18px rgba(15,23,42,.06)}.card h3{margin:0 0 8px;font-size:1rem;display:flex;align-items:center;gap:8px}.dot{width:10px;height:10px;border-radius:50%;display:inline-block}.minutes{font-size:1.6rem;font-weight:800}.tier{font-size:.78rem;font-weight:700;text-transform:uppercase;letter-spacing:.04em}.tone-good{color:var(--good)}.tone-warn{color:var(--warn)}.tone-bad{color:var(--bad)}.tone-muted{color:var(--muted)}.dist{font-size:.82rem;color:var(--muted)}.foot{margin-top:10px;padding-top:10px;border-top:1px solid var(--line);font-size:.8rem;color:var(--muted)}.foot b{color:var(--ink)}.foot a{color:#4338ca}.chart{margin-top:14px}.chart h2,.analysis h2{margin:0 0 12px;font-size:1rem}.plot{position:relative}.row{display:flex;align-items:center;gap:10px;margin:8px 0}.row-label{width:140px;font-size:.82rem}.track{position:relative;flex:1;height:22px;background:#f1f5f9;border-radius:6px}.bar{height:100%;border-radius:6px}.row-value{width:60px;font-size:.8rem;color:var(--muted);text-align:right}.ref{position:absolute;top:0;bottom:0;border-left:2px dashed var(--bad)}.ref-label{font-size:.72rem;color:var(--bad);margin-left:150px;position:relative}.analysis{margin-top:14px}.risks{margin:12px 0 0;padding-left:18px}.risks li{margin:4px 0}.loading{margin-top:40px;text-align:center}.spinner{width:36px;height:36px;border:4px solid #c7d2fe;border-top-color:#4338ca;border-radius:50%;margin:0 auto 14px;animation:spin 1s linear infinite}@keyframes spin{to{transform:rotate(360deg)}}.disclaimer{margin-top:18px;font-size:.75rem;color:var(--muted);text-align:center}@media (max-width:760px){.grid{grid-template-columns:1fr}.hero h1{font-size:1.3rem}.row-label{width:96px}.ref-label{margin-left:106px}}</style>\n";

const GEOLOCATION_SCRIPT: &str = "<script>(function(){var b=document.getElementById('geo-btn');var e=document.getElementById('geo-error');if(!b)return;b.addEventListener('click',function(){function fail(){e.style.display='block';}if(!navigator.geolocation){fail();return;}b.disabled=true;navigator.geolocation.getCurrentPosition(function(p){var t=b.getAttribute('data-token');window.location.href='/check?lat='+encodeURIComponent(p.coords.latitude)+'&lng='+encodeURIComponent(p.coords.longitude)+(t?'&token='+encodeURIComponent(t):'');},function(){b.disabled=false;fail();});});})();</script>\n";

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Hidden field that carries the access token into the next request.
fn token_input(access_token: Option<&str>) -> String {
    access_token
        .map(|t| format!("<input type=\"hidden\" name=\"token\" value=\"{}\">", escape_html(t)))
        .unwrap_or_default()
}

/// Complete document for one snapshot.
///
/// `access_token` is threaded through every form and the geolocation
/// redirect when the server requires one.
pub fn render_page(state: &ViewState, access_token: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(APP_TITLE)));
    out.push_str(STYLE);
    out.push_str("</head><body><main class=\"shell\">\n");
    out.push_str(&format!(
        "<header class=\"top\"><span class=\"brand\">⚡ {}</span>",
        escape_html(APP_TITLE)
    ));
    if matches!(state, ViewState::Results { .. }) {
        out.push_str(&format!(
            "<form method=\"get\" action=\"/\">{}<button class=\"btn btn-link\" type=\"submit\">Check another location</button></form>",
            token_input(access_token)
        ));
    }
    out.push_str("</header>\n");

    match state {
        ViewState::Idle => render_hero(&mut out, None, access_token),
        ViewState::Loading { label } => render_loading(&mut out, label),
        ViewState::Results {
            simulation,
            analysis,
        } => {
            render_results(&mut out, simulation);
            render_analysis(&mut out, analysis);
        }
        ViewState::Error { message, retry } => {
            render_hero(&mut out, Some((message.as_str(), retry.as_ref())), access_token);
        }
    }

    out.push_str(&format!(
        "<p class=\"disclaimer\">{}</p>\n",
        escape_html(DISCLAIMER)
    ));
    out.push_str("</main>\n");
    out.push_str(GEOLOCATION_SCRIPT);
    out.push_str("</body></html>\n");
    out
}

fn render_hero(
    out: &mut String,
    error: Option<(&str, Option<&LocationQuery>)>,
    access_token: Option<&str>,
) {
    out.push_str("<section class=\"hero\">");
    out.push_str(&format!("<h1>{}</h1>", escape_html(HERO_HEADLINE)));
    out.push_str("<p>We search live listings for nearby dark stores of Zepto, Blinkit and Swiggy Instamart and check whether a rider can physically make it in 10 minutes.</p>\n");
    out.push_str("<form class=\"search\" method=\"get\" action=\"/check\">");
    out.push_str("<input type=\"text\" name=\"q\" placeholder=\"Enter a locality, landmark or address\" required>");
    out.push_str(&token_input(access_token));
    out.push_str("<button class=\"btn btn-primary\" type=\"submit\">Check</button>");
    let data_token = access_token
        .map(|t| format!(" data-token=\"{}\"", escape_html(t)))
        .unwrap_or_default();
    out.push_str(&format!(
        "<button class=\"btn btn-ghost\" type=\"button\" id=\"geo-btn\"{data_token}>Use my location</button>"
    ));
    out.push_str("</form>\n");
    out.push_str(&format!(
        "<div class=\"error geo-error\" id=\"geo-error\">{}</div>\n",
        escape_html(GEOLOCATION_ERROR)
    ));
    if let Some((message, retry)) = error {
        out.push_str(&format!("<div class=\"error\">{}", escape_html(message)));
        if let Some(query) = retry {
            out.push_str(&retry_form(query, access_token));
        }
        out.push_str("</div>\n");
    }
    out.push_str("</section>\n");
}

/// The browser does the URL encoding of the retried query.
fn retry_form(query: &LocationQuery, access_token: Option<&str>) -> String {
    let mut out = String::from(
        "<form method=\"get\" action=\"/check\" style=\"display:inline;margin-left:8px\">",
    );
    match query {
        LocationQuery::Manual(text) => out.push_str(&format!(
            "<input type=\"hidden\" name=\"q\" value=\"{}\">",
            escape_html(text)
        )),
        LocationQuery::Device(coords) => out.push_str(&format!(
            "<input type=\"hidden\" name=\"lat\" value=\"{}\"><input type=\"hidden\" name=\"lng\" value=\"{}\">",
            coords.lat, coords.lng
        )),
    }
    out.push_str(&token_input(access_token));
    out.push_str("<button class=\"btn btn-link\" type=\"submit\">Try again</button></form>");
    out
}

fn render_loading(out: &mut String, label: &str) {
    out.push_str("<section class=\"loading\"><div class=\"spinner\"></div>");
    out.push_str(&format!("<h2>{}</h2>", escape_html(LOADING_TITLE)));
    out.push_str(&format!(
        "<p class=\"dist\">{}<br>{}</p>",
        escape_html(LOADING_DETAIL),
        escape_html(label)
    ));
    out.push_str("</section>\n");
}

fn render_results(out: &mut String, simulation: &SimulationResult) {
    out.push_str(&format!(
        "<section><h2>Search Results</h2><p class=\"dist\">Area: {}</p>",
        escape_html(&simulation.address_label)
    ));
    if simulation.estimates.is_empty() {
        out.push_str(&format!(
            "<p class=\"dist\">{}</p>",
            escape_html(NO_DATA_MESSAGE)
        ));
    }
    out.push_str("<div class=\"grid\">\n");
    for estimate in &simulation.estimates {
        render_card(out, estimate);
    }
    out.push_str("</div></section>\n");

    if let Some(chart) = chart_model(simulation) {
        render_chart(out, &chart);
    }
}

fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Good => "tone-good",
        Tone::Warn => "tone-warn",
        Tone::Bad => "tone-bad",
        Tone::Muted => "tone-muted",
    }
}

fn render_card(out: &mut String, estimate: &DeliveryEstimate) {
    out.push_str("<article class=\"card\">");
    out.push_str(&format!(
        "<h3><span class=\"dot\" style=\"background:{}\"></span>{}</h3>",
        escape_html(estimate.color()),
        escape_html(estimate.platform().name())
    ));

    if !estimate.is_found() {
        out.push_str(&format!(
            "<div class=\"tier tone-muted\">{}</div><p class=\"dist\">{}</p></article>\n",
            escape_html(NOT_FOUND_TITLE),
            escape_html(NOT_FOUND_DETAIL)
        ));
        return;
    }

    let tone = tone_class(estimate.feasibility().into());
    out.push_str(&format!(
        "<div class=\"minutes {tone}\">{} mins</div><div class=\"tier {tone}\">{}</div>",
        estimate.travel_minutes(),
        escape_html(estimate.feasibility().label())
    ));
    out.push_str(&format!(
        "<div class=\"dist\">(~{} km drive)</div>",
        format_km(estimate.distance_km())
    ));
    out.push_str("<div class=\"foot\">");
    out.push_str(&format!(
        "<div>Found Location: <b>{}</b></div><div>{}</div>",
        escape_html(estimate.store_name()),
        escape_html(estimate.store_address().unwrap_or("N/A"))
    ));
    if let Some(link) = estimate.evidence_link().filter(|l| is_web_link(l)) {
        out.push_str(&format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Verify Source</a>",
            escape_html(link)
        ));
    }
    out.push_str("</div></article>\n");
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction.clamp(0.0, 1.0) * 100.0)
}

fn render_chart(out: &mut String, chart: &ChartModel) {
    out.push_str("<section class=\"card chart\">");
    out.push_str(&format!("<h2>{}</h2>", escape_html(CHART_TITLE)));
    out.push_str(&format!(
        "<div class=\"ref-label\" style=\"left:{}\">{}</div>",
        percent(chart.reference_fraction),
        escape_html(REFERENCE_LABEL)
    ));
    out.push_str("<div class=\"plot\">\n");
    for bar in &chart.bars {
        out.push_str(&format!(
            "<div class=\"row\"><span class=\"row-label\">{}</span><div class=\"track\"><div class=\"bar\" style=\"width:{};background:{}\" title=\"{} min ({} km)\"></div><div class=\"ref\" style=\"left:{}\"></div></div><span class=\"row-value\">{} min</span></div>\n",
            escape_html(bar.platform.name()),
            percent(bar.fraction),
            escape_html(&bar.color),
            bar.minutes,
            format_km(bar.distance_km),
            percent(chart.reference_fraction),
            bar.minutes
        ));
    }
    out.push_str(&format!(
        "</div><div class=\"dist\">0 to {} min</div></section>\n",
        chart.axis_max_min
    ));
}

fn render_analysis(out: &mut String, analysis: &AnalysisState) {
    out.push_str("<section class=\"card analysis\">");
    out.push_str(&format!("<h2>✦ {}</h2>", escape_html(ANALYSIS_TITLE)));
    match analysis {
        AnalysisState::Pending => out.push_str(&format!(
            "<p class=\"dist\">{}</p>",
            escape_html(ANALYSIS_LOADING)
        )),
        AnalysisState::Ready(response) => {
            out.push_str(&format!("<p>{}</p>", escape_html(&response.summary)));
            if !response.risk_factors.is_empty() {
                out.push_str(&format!(
                    "<h3 class=\"tone-bad\">{}</h3><ul class=\"risks\">",
                    escape_html(RISKS_TITLE)
                ));
                for risk in &response.risk_factors {
                    out.push_str(&format!("<li>{}</li>", escape_html(risk)));
                }
                out.push_str("</ul>");
            }
        }
    }
    out.push_str("</section>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::no_stores_analysis;
    use crate::geo::Coordinates;
    use crate::models::{AnalysisResponse, Platform};
    use std::sync::Arc;

    fn results_state(estimates: Vec<DeliveryEstimate>, analysis: AnalysisState) -> ViewState {
        ViewState::Results {
            simulation: Arc::new(SimulationResult::new(
                None,
                "HSR <Layout>".to_string(),
                estimates,
            )),
            analysis,
        }
    }

    fn render_page_plain(state: &ViewState) -> String {
        render_page(state, None)
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn idle_page_has_form_and_geolocation() {
        let page = render_page(&ViewState::Idle, None);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("action=\"/check\""));
        assert!(page.contains("name=\"q\""));
        assert!(page.contains("id=\"geo-btn\""));
        assert!(page.contains("/check?lat="));
        assert!(!page.contains("Check another location"));
    }

    #[test]
    fn results_page_escapes_model_text() {
        let page = render_page_plain(&results_state(
            vec![DeliveryEstimate::found(
                Platform::Zepto,
                "<script>alert(1)</script>".to_string(),
                None,
                1.5,
                7,
                Some("https://maps.google.com/?q=a&b".to_string()),
            )],
            AnalysisState::Ready(AnalysisResponse {
                summary: "Fast & close".to_string(),
                risk_factors: vec!["Rain <heavy>".to_string()],
            }),
        ));
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("Area: HSR &lt;Layout&gt;"));
        assert!(page.contains("href=\"https://maps.google.com/?q=a&amp;b\""));
        assert!(page.contains("Fast &amp; close"));
        assert!(page.contains("Rain &lt;heavy&gt;"));
        assert!(page.contains("(~1.5 km drive)"));
        assert!(page.contains("Check another location"));
    }

    #[test]
    fn chart_only_with_found_stores() {
        let none_found = render_page_plain(&results_state(
            Platform::ALL.iter().map(|p| DeliveryEstimate::not_found(*p)).collect(),
            AnalysisState::Ready(no_stores_analysis()),
        ));
        assert!(!none_found.contains(CHART_TITLE));
        assert_eq!(none_found.matches(NOT_FOUND_TITLE).count(), 3);
        assert!(none_found.contains(RISKS_TITLE));

        let some_found = render_page_plain(&results_state(
            vec![DeliveryEstimate::found(Platform::Blinkit, "B".to_string(), None, 2.5, 10, None)],
            AnalysisState::Pending,
        ));
        assert!(some_found.contains(CHART_TITLE));
        assert!(some_found.contains(REFERENCE_LABEL));
        assert!(some_found.contains("left:50.00%"));
        assert!(some_found.contains(ANALYSIS_LOADING));
        assert!(some_found.contains("tone-warn"));
    }

    #[test]
    fn error_page_keeps_search_and_offers_retry() {
        let page = render_page_plain(&ViewState::Error {
            message: "Failed to perform reality check. Please try again.".to_string(),
            retry: Some(LocationQuery::Device(Coordinates::new(12.5, 77.25).unwrap())),
        });
        assert!(page.contains("name=\"q\""));
        assert!(page.contains("Failed to perform reality check"));
        assert!(page.contains("name=\"lat\" value=\"12.5\""));
        assert!(page.contains("Try again"));
    }

    #[test]
    fn access_token_rides_along_every_form() {
        let idle = render_page(&ViewState::Idle, Some("s3cret"));
        assert!(idle.contains("<input type=\"hidden\" name=\"token\" value=\"s3cret\">"));
        assert!(idle.contains("data-token=\"s3cret\""));

        let results = render_page(
            &results_state(Vec::new(), AnalysisState::Pending),
            Some("s3cret"),
        );
        assert!(results.contains("action=\"/\"><input type=\"hidden\" name=\"token\""));

        let error = render_page(
            &ViewState::Error {
                message: "Failed".to_string(),
                retry: Some(LocationQuery::Manual("HSR".to_string())),
            },
            Some("a\"b"),
        );
        assert_eq!(error.matches("name=\"token\" value=\"a&quot;b\"").count(), 2);

        assert!(!render_page_plain(&ViewState::Idle).contains("name=\"token\""));
    }

    #[test]
    fn script_links_are_not_rendered() {
        let page = render_page_plain(&results_state(
            vec![DeliveryEstimate::found(
                Platform::Zepto,
                "Z".to_string(),
                None,
                1.0,
                5,
                Some("javascript:alert(1)".to_string()),
            )],
            AnalysisState::Pending,
        ));
        assert!(!page.contains("javascript:alert"));
        assert!(!page.contains("Verify Source"));
    }

    #[test]
    fn loading_page() {
        let page = render_page_plain(&ViewState::Loading {
            label: "Koramangala".to_string(),
        });
        assert!(page.contains(LOADING_TITLE));
        assert!(page.contains("Koramangala"));
    }
}
