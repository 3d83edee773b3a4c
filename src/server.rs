use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{Html, Redirect, Response};
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{RealityCheckError, Result};
use crate::geo::{Coordinates, LocationQuery};
use crate::render::html::render_page;
use crate::service::RealityCheckService;
use crate::session::{AnalysisState, GEOLOCATION_ERROR, Session, ViewState};

#[derive(Clone)]
struct AppState {
    service: RealityCheckService,
    /// Echoed into rendered pages so browser navigation stays authorised
    access_token: Option<Arc<String>>,
}

/// `q` for a typed location, `lat`/`lng` for a device position.
#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
    pub q: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

impl CheckParams {
    /// `None` when nothing usable was supplied. Coordinates win over `q`;
    /// a missing or malformed half of a position is an unavailable position.
    pub fn location(&self) -> Option<Result<LocationQuery>> {
        if self.lat.is_some() || self.lng.is_some() {
            let parse = |name: &str, v: &Option<String>| -> Result<f64> {
                v.as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| RealityCheckError::InvalidLocation(format!("missing {name}")))?
                    .parse::<f64>()
                    .map_err(|e| RealityCheckError::InvalidLocation(format!("{name}: {e}")))
            };
            let position = parse("lat", &self.lat)
                .and_then(|lat| Ok((lat, parse("lng", &self.lng)?)))
                .and_then(|(lat, lng)| Coordinates::new(lat, lng))
                .map(LocationQuery::Device);
            return Some(position);
        }
        self.q.as_deref().and_then(LocationQuery::manual).map(Ok)
    }
}

pub fn router(service: RealityCheckService, bearer_token: Option<String>) -> Router {
    let access_token = bearer_token.map(Arc::new);
    let mut router = Router::new()
        .route("/", get(index))
        .route("/check", get(check_page))
        .route("/api/check", get(check_api))
        .with_state(AppState {
            service,
            access_token: access_token.clone(),
        });

    if let Some(expected) = access_token {
        router = router.layer(middleware::from_fn_with_state(expected, require_bearer));
    }

    router.route("/health", get(|| async { "ok" }))
}

pub async fn serve(
    service: RealityCheckService,
    bind: SocketAddr,
    bearer_token: Option<String>,
) -> anyhow::Result<()> {
    let auth = if bearer_token.is_some() { "bearer" } else { "none" };
    let app = router(service, bearer_token);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, auth, "Starting reality check web server");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run one search in a fresh session and return where it ended up.
async fn execute(service: &RealityCheckService, location: Result<LocationQuery>) -> Arc<ViewState> {
    let session = Session::new();
    match location {
        Ok(query) => service.run_guarded(&session, query).await,
        Err(e) => {
            if let Err(e) = service.run_device(&session, Err(e)).await {
                tracing::warn!("Could not record geolocation failure: {}", e);
            }
        }
    }
    session.snapshot()
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&ViewState::Idle, state.access_token.as_deref().map(String::as_str)))
}

async fn check_page(State(state): State<AppState>, Query(params): Query<CheckParams>) -> Response {
    let Some(location) = params.location() else {
        return Redirect::to("/").into_response();
    };
    let view = execute(&state.service, location).await;
    let status = match &*view {
        ViewState::Error { message, .. } if message == GEOLOCATION_ERROR => StatusCode::BAD_REQUEST,
        ViewState::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    let page = render_page(&view, state.access_token.as_deref().map(String::as_str));
    (status, Html(page)).into_response()
}

async fn check_api(State(state): State<AppState>, Query(params): Query<CheckParams>) -> Response {
    let Some(location) = params.location() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Provide a location with q, or lat and lng" })),
        )
            .into_response();
    };

    let view = execute(&state.service, location).await;
    match &*view {
        ViewState::Results {
            simulation,
            analysis: AnalysisState::Ready(analysis),
        } => Json(json!({ "simulation": simulation.as_ref(), "analysis": analysis })).into_response(),
        ViewState::Error { message, .. } if message == GEOLOCATION_ERROR => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        ViewState::Error { message, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
        }
        other => {
            tracing::error!(state = other.name(), "Search finished in an unexpected state");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Search did not complete" })),
            )
                .into_response()
        }
    }
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let headers: &HeaderMap = req.headers();
    let header_ok = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()));

    // Browsers following a link cannot set headers; accept access_token or token
    let query_ok = req.uri().query().is_some_and(|q| {
        q.split('&').any(|pair| {
            pair.split_once('=')
                .is_some_and(|(k, v)| (k == "access_token" || k == "token") && v == expected.as_str())
        })
    });

    if !(header_ok || query_ok) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockFeasibilityAnalyst;
    use crate::discovery::MockStoreDiscovery;
    use crate::models::{AnalysisResponse, DeliveryEstimate, Platform};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn service() -> RealityCheckService {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().returning(|_| {
            vec![
                DeliveryEstimate::found(Platform::Zepto, "Zepto HSR".to_string(), None, 1.0, 5, None),
                DeliveryEstimate::not_found(Platform::Blinkit),
                DeliveryEstimate::not_found(Platform::SwiggyInstamart),
            ]
        });
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().returning(|_, _| AnalysisResponse {
            summary: "Zepto makes it.".to_string(),
            risk_factors: vec!["Rain".to_string()],
        });
        RealityCheckService::new(Arc::new(discovery), Arc::new(analyst))
    }

    fn idle_service() -> RealityCheckService {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().never();
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().never();
        RealityCheckService::new(Arc::new(discovery), Arc::new(analyst))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn params_prefer_coordinates() {
        let params = CheckParams {
            q: Some("HSR".to_string()),
            lat: Some("12.9".to_string()),
            lng: Some("77.6".to_string()),
        };
        assert!(matches!(params.location(), Some(Ok(LocationQuery::Device(_)))));

        let half = CheckParams {
            lat: Some("12.9".to_string()),
            ..CheckParams::default()
        };
        assert!(matches!(half.location(), Some(Err(_))));

        let blank = CheckParams {
            q: Some("   ".to_string()),
            ..CheckParams::default()
        };
        assert!(blank.location().is_none());
    }

    #[tokio::test]
    async fn test_index_renders_search_form() {
        let (status, body) = get_body(router(idle_service(), None), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("name=\"q\""));
    }

    #[tokio::test]
    async fn test_check_page_renders_results() {
        let (status, body) = get_body(router(service(), None), "/check?q=HSR%20Layout").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Area: HSR Layout"));
        assert!(body.contains("5 mins"));
        assert!(body.contains("Zepto makes it."));
    }

    #[tokio::test]
    async fn test_blank_query_redirects_home() {
        let response = router(idle_service(), None)
            .oneshot(Request::builder().uri("/check?q=").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_redirection());
    }

    #[tokio::test]
    async fn test_api_returns_simulation_and_analysis() {
        let (status, body) = get_body(router(service(), None), "/api/check?lat=12.9&lng=77.6").await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["simulation"]["addressLabel"], "Your Coordinates");
        assert_eq!(value["simulation"]["userLocation"]["lat"], 12.9);
        assert_eq!(value["simulation"]["estimates"][0]["feasibility"], "Highly Feasible");
        assert_eq!(value["analysis"]["riskFactors"][0], "Rain");
    }

    #[tokio::test]
    async fn test_api_bad_position_is_geolocation_error() {
        let (status, body) = get_body(router(idle_service(), None), "/api/check?lat=abc&lng=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["error"], GEOLOCATION_ERROR);
    }

    #[tokio::test]
    async fn test_api_requires_location() {
        let (status, _) = get_body(router(idle_service(), None), "/api/check").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let token = Some("s3cret".to_string());

        let (status, _) = get_body(router(idle_service(), token.clone()), "/").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get_body(router(idle_service(), token.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, _) = get_body(router(idle_service(), token.clone()), "/?token=s3cret").await;
        assert_eq!(status, StatusCode::OK);

        let response = router(idle_service(), token)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("authorization", "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_browser_flow_keeps_token() {
        let token = Some("s3cret".to_string());

        let (status, home) = get_body(router(idle_service(), token.clone()), "/?token=s3cret").await;
        assert_eq!(status, StatusCode::OK);
        assert!(home.contains("name=\"token\" value=\"s3cret\""));
        assert!(home.contains("data-token=\"s3cret\""));

        // what the search form submits
        let (status, results) =
            get_body(router(service(), token.clone()), "/check?token=s3cret&q=HSR").await;
        assert_eq!(status, StatusCode::OK);
        assert!(results.contains("Zepto makes it."));
        assert!(results.contains("name=\"token\" value=\"s3cret\""));

        let (status, _) = get_body(router(idle_service(), token), "/check?q=HSR").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
