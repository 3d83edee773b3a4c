//! Search session state machine.
//!
//! `Idle → Loading → {Results, Error}`, `Results → Idle` on reset,
//! `Error → Loading` on retry. Every transition publishes a fresh
//! `Arc<ViewState>`; nothing is mutated in place.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::geo::LocationQuery;
use crate::models::{AnalysisResponse, SimulationResult};

pub const GEOLOCATION_ERROR: &str =
    "Unable to retrieve location. Please try manually entering a nearby landmark.";
pub const SEARCH_FAILED_ERROR: &str = "Failed to perform reality check. Please try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Pending,
    Ready(AnalysisResponse),
}

#[derive(Debug, Clone)]
pub enum ViewState {
    Idle,
    Loading {
        label: String,
    },
    Results {
        simulation: Arc<SimulationResult>,
        analysis: AnalysisState,
    },
    Error {
        message: String,
        /// Query to re-run when the user retries, if there is one
        retry: Option<LocationQuery>,
    },
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::Loading { .. } => "loading",
            ViewState::Results { .. } => "showing results",
            ViewState::Error { .. } => "showing an error",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading { .. })
    }
}

/// Owner of the current snapshot. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Arc<ViewState>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(ViewState::Idle));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<ViewState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewState>> {
        self.tx.subscribe()
    }

    /// Start a search. Allowed from `Idle`, and from `Error` as a retry.
    pub fn begin(&self, label: &str) -> Result<(), SessionError> {
        self.transition("start a search", |state| match state {
            ViewState::Idle | ViewState::Error { .. } => Some(ViewState::Loading {
                label: label.to_string(),
            }),
            _ => None,
        })
    }

    pub fn show_results(&self, simulation: SimulationResult) -> Result<(), SessionError> {
        let simulation = Arc::new(simulation);
        self.transition("show results", |state| match state {
            ViewState::Loading { .. } => Some(ViewState::Results {
                simulation: Arc::clone(&simulation),
                analysis: AnalysisState::Pending,
            }),
            _ => None,
        })
    }

    pub fn fail(&self, message: &str, retry: Option<LocationQuery>) -> Result<(), SessionError> {
        self.transition("report an error", |state| match state {
            ViewState::Loading { .. } => Some(ViewState::Error {
                message: message.to_string(),
                retry: retry.clone(),
            }),
            _ => None,
        })
    }

    /// Attach the analysis to the results it was computed for.
    ///
    /// Returns `false` when the session has moved on (reset or a newer
    /// search) and the analysis was dropped.
    pub fn complete_analysis(&self, search_id: Uuid, analysis: AnalysisResponse) -> bool {
        let applied = self
            .transition("attach an analysis", |state| match state {
                ViewState::Results { simulation, .. } if simulation.id == search_id => {
                    Some(ViewState::Results {
                        simulation: Arc::clone(simulation),
                        analysis: AnalysisState::Ready(analysis.clone()),
                    })
                }
                _ => None,
            })
            .is_ok();
        if !applied {
            tracing::debug!(%search_id, "Dropping stale analysis");
        }
        applied
    }

    /// "Check another location".
    pub fn reset(&self) -> Result<(), SessionError> {
        self.transition("reset", |state| match state {
            ViewState::Results { .. } => Some(ViewState::Idle),
            _ => None,
        })
    }

    fn transition<F>(&self, action: &'static str, next: F) -> Result<(), SessionError>
    where
        F: FnOnce(&ViewState) -> Option<ViewState>,
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|current| match next(current.as_ref()) {
            Some(state) => {
                tracing::debug!(from = current.name(), to = state.name(), "Session transition");
                *current = Arc::new(state);
                true
            }
            None => {
                outcome = Err(SessionError::InvalidTransition {
                    state: current.name(),
                    action,
                });
                false
            }
        });
        outcome
    }
}
