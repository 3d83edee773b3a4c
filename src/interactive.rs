//! Terminal front end: a prompt loop over one [`Session`], with a spinner
//! while a search is in flight.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::geo::{Coordinates, LocationQuery};
use crate::render::terminal;
use crate::render::{ANALYSIS_LOADING, DISCLAIMER, LOADING_TITLE};
use crate::service::RealityCheckService;
use crate::session::{AnalysisState, Session, ViewState};

#[derive(Debug)]
pub enum Command {
    Quit,
    Blank,
    Search(Result<LocationQuery>),
}

/// `@lat, lng` searches from coordinates; anything else is a place name.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Blank;
    }
    if matches!(trimmed.to_ascii_lowercase().as_str(), "q" | "quit" | "exit") {
        return Command::Quit;
    }
    match trimmed.strip_prefix('@') {
        Some(position) => Command::Search(position.parse::<Coordinates>().map(LocationQuery::Device)),
        None => Command::Search(Ok(LocationQuery::Manual(trimmed.to_string()))),
    }
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(LOADING_TITLE);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Run one search on `session`, printing cards as soon as they arrive and the
/// analysis once it lands. Returns the final snapshot.
pub async fn run_search(
    service: &RealityCheckService,
    session: &Session,
    location: Result<LocationQuery>,
) -> Arc<ViewState> {
    let progress = spinner();
    let mut rx = session.subscribe();
    let mut cards_shown = false;

    let search = async {
        match location {
            Ok(query) => service.run_guarded(session, query).await,
            Err(e) => {
                if let Err(e) = service.run_device(session, Err(e)).await {
                    tracing::warn!("Could not record geolocation failure: {}", e);
                }
            }
        }
    };
    tokio::pin!(search);

    loop {
        tokio::select! {
            _ = &mut search => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    (&mut search).await;
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if let ViewState::Results { simulation, analysis: AnalysisState::Pending } = &*snapshot {
                    if !cards_shown {
                        progress.suspend(|| print!("{}", terminal::results(simulation)));
                        progress.set_message(ANALYSIS_LOADING);
                        cards_shown = true;
                    }
                }
            }
        }
    }
    progress.finish_and_clear();

    let snapshot = session.snapshot();
    match &*snapshot {
        ViewState::Results {
            simulation,
            analysis,
        } => {
            if !cards_shown {
                print!("{}", terminal::results(simulation));
            }
            print!("{}", terminal::analysis_card(analysis));
            println!("\n{DISCLAIMER}\n");
        }
        other => print!("{}", terminal::render(other)),
    }
    snapshot
}

/// One search from the command line. Errors after printing them.
pub async fn check_once(
    service: &RealityCheckService,
    location: Result<LocationQuery>,
) -> anyhow::Result<()> {
    let session = Session::new();
    let snapshot = run_search(service, &session, location).await;
    if let ViewState::Error { message, .. } = &*snapshot {
        anyhow::bail!("{}", message);
    }
    Ok(())
}

fn prompt_for(state: &ViewState) -> &'static str {
    match state {
        ViewState::Results { .. } => "Press Enter to check another location (q to quit)> ",
        ViewState::Error { retry: Some(_), .. } => "Enter to retry, or type a location> ",
        _ => "Location> ",
    }
}

pub async fn repl(service: RealityCheckService) -> anyhow::Result<()> {
    let session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("{}", terminal::render(&ViewState::Idle));

    loop {
        let snapshot = session.snapshot();
        print!("\n{}", prompt_for(&snapshot));
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match (&*snapshot, parse_command(&line)) {
            (_, Command::Quit) => break,
            (ViewState::Results { .. }, command) => {
                session.reset()?;
                match command {
                    Command::Search(location) => {
                        run_search(&service, &session, location).await;
                    }
                    _ => print!("{}", terminal::render(&ViewState::Idle)),
                }
            }
            (ViewState::Error { retry: Some(query), .. }, Command::Blank) => {
                run_search(&service, &session, Ok(query.clone())).await;
            }
            (_, Command::Blank) => continue,
            (_, Command::Search(location)) => {
                run_search(&service, &session, location).await;
            }
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockFeasibilityAnalyst;
    use crate::discovery::MockStoreDiscovery;
    use crate::models::{AnalysisResponse, DeliveryEstimate, Platform};
    use crate::session::GEOLOCATION_ERROR;

    #[test]
    fn parses_commands() {
        assert!(matches!(parse_command("   "), Command::Blank));
        assert!(matches!(parse_command("Quit"), Command::Quit));
        assert!(matches!(
            parse_command(" HSR Layout "),
            Command::Search(Ok(LocationQuery::Manual(ref s))) if s == "HSR Layout"
        ));
        assert!(matches!(
            parse_command("@12.9, 77.6"),
            Command::Search(Ok(LocationQuery::Device(_)))
        ));
        assert!(matches!(parse_command("@north pole"), Command::Search(Err(_))));
    }

    #[tokio::test]
    async fn test_run_search_finishes_with_analysis() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().returning(|_| {
            vec![DeliveryEstimate::found(Platform::Blinkit, "B".to_string(), None, 2.0, 8, None)]
        });
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().returning(|_, _| AnalysisResponse {
            summary: "ok".to_string(),
            risk_factors: Vec::new(),
        });
        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));
        let session = Session::new();

        let snapshot = run_search(&service, &session, Ok(LocationQuery::Manual("HSR".to_string()))).await;
        assert!(matches!(
            &*snapshot,
            ViewState::Results { analysis: AnalysisState::Ready(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_check_once_reports_unavailable_position() {
        let mut discovery = MockStoreDiscovery::new();
        discovery.expect_discover().never();
        let mut analyst = MockFeasibilityAnalyst::new();
        analyst.expect_analyze().never();
        let service = RealityCheckService::new(Arc::new(discovery), Arc::new(analyst));

        let err = check_once(
            &service,
            Err(crate::error::RealityCheckError::InvalidLocation("none".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), GEOLOCATION_ERROR);
    }
}
