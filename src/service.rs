use std::sync::Arc;

use crate::analysis::{FeasibilityAnalyst, unavailable_analysis};
use crate::discovery::StoreDiscovery;
use crate::error::Result;
use crate::geo::{DEVICE_LOCATION_LABEL, LocationQuery};
use crate::models::{AnalysisResponse, SimulationResult};
use crate::session::{AnalysisState, GEOLOCATION_ERROR, SEARCH_FAILED_ERROR, Session, ViewState};

/// Runs one reality check: store discovery, then the narrative analysis.
#[derive(Clone)]
pub struct RealityCheckService {
    discovery: Arc<dyn StoreDiscovery>,
    analyst: Arc<dyn FeasibilityAnalyst>,
}

impl RealityCheckService {
    pub fn new(
        discovery: Arc<dyn StoreDiscovery>,
        analyst: Arc<dyn FeasibilityAnalyst>,
    ) -> Self {
        Self { discovery, analyst }
    }

    pub async fn discover(&self, query: &LocationQuery) -> SimulationResult {
        let estimates = self.discovery.discover(&query.query_text()).await;
        SimulationResult::new(query.coordinates(), query.label(), estimates)
    }

    pub async fn analyze(&self, simulation: &SimulationResult) -> AnalysisResponse {
        self.analyst
            .analyze(&simulation.address_label, &simulation.estimates)
            .await
    }

    /// Drive `session` through one search.
    ///
    /// Results are published as soon as discovery returns; the analysis is
    /// attached afterwards.
    pub async fn run(&self, session: &Session, query: LocationQuery) -> Result<()> {
        session.begin(&query.label())?;

        let simulation = self.discover(&query).await;
        let search_id = simulation.id;
        tracing::info!(
            %search_id,
            label = %simulation.address_label,
            found = simulation.found_estimates().count(),
            "Store discovery finished"
        );

        session.show_results(simulation.clone())?;

        let analysis = self.analyze(&simulation).await;
        session.complete_analysis(search_id, analysis);
        Ok(())
    }

    /// Same flow for a device position that may be unavailable.
    pub async fn run_device(&self, session: &Session, position: Result<LocationQuery>) -> Result<()> {
        match position {
            Ok(query) => self.run(session, query).await,
            Err(e) => {
                tracing::warn!("Geolocation unavailable: {}", e);
                session.begin(DEVICE_LOCATION_LABEL)?;
                session.fail(GEOLOCATION_ERROR, None)?;
                Ok(())
            }
        }
    }

    /// Run the search on its own task so a crash inside it lands the session
    /// in the error state instead of taking the caller down.
    ///
    /// A crash after the results were published keeps them on screen and
    /// settles the pending analysis with the unavailable message.
    pub async fn run_guarded(&self, session: &Session, query: LocationQuery) {
        let service = self.clone();
        let task_session = session.clone();
        let task_query = query.clone();
        let handle =
            tokio::spawn(async move { service.run(&task_session, task_query).await });

        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Search rejected: {}", e),
            Err(e) => {
                tracing::error!("Search task failed: {}", e);
                let snapshot = session.snapshot();
                if let ViewState::Results {
                    simulation,
                    analysis: AnalysisState::Pending,
                } = &*snapshot
                {
                    session.complete_analysis(simulation.id, unavailable_analysis());
                } else if let Err(e) = session.fail(SEARCH_FAILED_ERROR, Some(query)) {
                    tracing::debug!("Could not report failed search: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{MockFeasibilityAnalyst, no_stores_analysis};
    use crate::discovery::MockStoreDiscovery;
    use crate::error::RealityCheckError;
    use crate::geo::Coordinates;
    use crate::models::{DeliveryEstimate, Platform};
    use async_trait::async_trait;

    struct ExplodingDiscovery;

    #[async_trait]
    impl StoreDiscovery for ExplodingDiscovery {
        async fn discover(&self, _location_query: &str) -> Vec<DeliveryEstimate> {
            panic!("discovery exploded")
        }
    }

    struct ExplodingAnalyst;

    #[async_trait]
    impl FeasibilityAnalyst for ExplodingAnalyst {
        async fn analyze(&self, _location: &str, _estimates: &[DeliveryEstimate]) -> AnalysisResponse {
            panic!("analysis exploded")
        }
    }

    fn zepto_only() -> Vec<DeliveryEstimate> {
        vec![
            DeliveryEstimate::found(Platform::Zepto, "Z".to_string(), None, 1.0, 5, None),
            DeliveryEstimate::not_found(Platform::Blinkit),
            DeliveryEstimate::not_found(Platform::SwiggyInstamart),
        ]
    }

    #[tokio::test]
    async fn test_run_publishes_results_then_analysis() {
        let mut discovery = MockStoreDiscovery::new();
        discovery
            .expect_discover()
            .withf(|q| q == "12.9, 77.6")
            .times(1)
            .returning(|_| zepto_only());

        let mut analyst = MockFeasibilityAnalyst::new();
        analyst
            .expect_analyze()
            .withf(|label, estimates| label == "Your Coordinates" && estimates.len() == 3)
            .times(1)
            .returning(|_, _| AnalysisResponse {
                summary: "Fine".to_string(),
                risk_factors: vec!["Rain".to_string()],
            });

        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));
        let session = Session::new();
        let query = LocationQuery::Device(Coordinates::new(12.9, 77.6).unwrap());

        service.run(&session, query).await.unwrap();

        match &*session.snapshot() {
            ViewState::Results {
                simulation,
                analysis: AnalysisState::Ready(analysis),
            } => {
                assert_eq!(simulation.address_label, "Your Coordinates");
                assert!(simulation.user_location.is_some());
                assert_eq!(simulation.estimates.len(), 3);
                assert_eq!(analysis.summary, "Fine");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_discovery_still_shows_results() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().returning(|_| Vec::new());
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst
            .expect_analyze()
            .returning(|_, _| no_stores_analysis());

        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));
        let session = Session::new();
        service
            .run(&session, LocationQuery::Manual("Atlantis".to_string()))
            .await
            .unwrap();

        match &*session.snapshot() {
            ViewState::Results { simulation, .. } => {
                assert!(simulation.estimates.is_empty());
                assert!(simulation.user_location.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_position_lands_in_error() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().never();
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().never();

        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));
        let session = Session::new();
        service
            .run_device(
                &session,
                Err(RealityCheckError::InvalidLocation("denied".to_string())),
            )
            .await
            .unwrap();

        assert!(matches!(
            &*session.snapshot(),
            ViewState::Error { message, retry: None } if message == GEOLOCATION_ERROR
        ));
    }

    #[tokio::test]
    async fn test_run_rejected_while_showing_results() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().times(1).returning(|_| zepto_only());
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst
            .expect_analyze()
            .times(1)
            .returning(|_, _| no_stores_analysis());

        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));
        let session = Session::new();
        service
            .run(&session, LocationQuery::Manual("A".to_string()))
            .await
            .unwrap();

        let err = service
            .run(&session, LocationQuery::Manual("B".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RealityCheckError::Session(_)));
    }

    #[tokio::test]
    async fn test_panicking_search_becomes_retryable_error() {
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().never();

        let service = RealityCheckService::new(Arc::new(ExplodingDiscovery), Arc::new(analyst));
        let session = Session::new();
        let query = LocationQuery::Manual("Indiranagar".to_string());
        service.run_guarded(&session, query.clone()).await;

        match &*session.snapshot() {
            ViewState::Error { message, retry } => {
                assert_eq!(message, SEARCH_FAILED_ERROR);
                assert_eq!(retry.as_ref(), Some(&query));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_after_results_settles_analysis() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().returning(|_| zepto_only());

        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(ExplodingAnalyst));
        let session = Session::new();
        service
            .run_guarded(&session, LocationQuery::Manual("Koramangala".to_string()))
            .await;

        match &*session.snapshot() {
            ViewState::Results {
                simulation,
                analysis: AnalysisState::Ready(analysis),
            } => {
                assert_eq!(simulation.address_label, "Koramangala");
                assert_eq!(simulation.found_estimates().count(), 1);
                assert_eq!(analysis, &unavailable_analysis());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
