//! Client-side view of one match, kept in step with the event stream.
//!
//! Snapshots from `GET /matches/{id}` replace the view wholesale; stream
//! events patch it locally. Events that change tallies or history the payload
//! does not carry (`TURN_ENDED`, `MATCH_ENDED`) ask the owner for a re-fetch
//! instead. Every activation starts a new epoch, and loads that finish after
//! the epoch moved on are dropped.

use chifumi_common::{Match, StreamEvent};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::submit::SubmitOutcome;

pub const INITIAL_STATUS: &str = "Waiting for match updates...";
pub const SUBMITTED_STATUS: &str = "Move submitted, waiting for next event...";
pub const GENERIC_UPDATE_STATUS: &str = "Update received from game.";
pub const STREAM_ERROR: &str = "SSE connection error, will retry...";

const LOAD_FAILED: &str = "Failed to load match details.";
const LOAD_NETWORK_ERROR: &str = "Network error or server is down.";
const SUBMIT_NETWORK_ERROR: &str = "Network error when trying to play turn.";

/// Outcome of applying one stream event
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub status: String,
    /// The event invalidated data only a full load can restore
    pub refetch: bool,
}

impl StateChange {
    fn new(status: impl Into<String>, refetch: bool) -> Self {
        StateChange {
            status: status.into(),
            refetch,
        }
    }
}

/// Pure transition: returns the patched snapshot when the event changes
/// structure, `None` when it leaves the snapshot as is.
pub fn reduce(snapshot: Option<&Match>, match_id: &str, event: &StreamEvent) -> (Option<Match>, StateChange) {
    match event {
        StreamEvent::PlayerJoined { user, .. } => (None, StateChange::new(format!("{user} has joined the match"), false)),
        StreamEvent::NewTurn { turn_id } => {
            let patched = match snapshot {
                Some(current) if current.current_turn_id.as_deref() == Some(turn_id.as_str()) => None,
                Some(current) => Some(Match {
                    current_turn_id: Some(turn_id.clone()),
                    ..current.clone()
                }),
                None => Some(Match::pending(match_id, Some(turn_id.clone()))),
            };
            (patched, StateChange::new(format!("Turn {turn_id} has started"), false))
        }
        StreamEvent::PlayerMoved { turn, .. } => (None, StateChange::new(format!("Player moved in turn {turn}"), false)),
        StreamEvent::TurnEnded { winner } => (
            None,
            StateChange::new(format!("Turn ended. Winner: {}", winner_label(winner)), true),
        ),
        StreamEvent::MatchEnded { winner } => (
            None,
            StateChange::new(format!("Match ended. Winner: {}", winner_label(winner)), true),
        ),
        StreamEvent::Unknown { .. } => (None, StateChange::new(GENERIC_UPDATE_STATUS, false)),
    }
}

fn winner_label(winner: &Option<String>) -> &str {
    winner.as_deref().unwrap_or("none")
}

fn load_error_text(err: &ApiError) -> String {
    match err {
        ApiError::Network(_) | ApiError::Decode(_) => LOAD_NETWORK_ERROR.to_string(),
        other => other.server_message().unwrap_or(LOAD_FAILED).to_string(),
    }
}

#[derive(Debug)]
pub struct MatchStateStore {
    match_id: Option<String>,
    snapshot: Option<Match>,
    status: String,
    error: Option<String>,
    epoch: u64,
    loads_in_flight: usize,
}

impl Default for MatchStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStateStore {
    pub fn new() -> Self {
        MatchStateStore {
            match_id: None,
            snapshot: None,
            status: INITIAL_STATUS.to_string(),
            error: None,
            epoch: 0,
            loads_in_flight: 0,
        }
    }

    /// Start tracking `match_id` from a clean slate
    pub fn activate(&mut self, match_id: &str) -> u64 {
        self.epoch += 1;
        self.match_id = Some(match_id.to_string());
        self.snapshot = None;
        self.status = INITIAL_STATUS.to_string();
        self.error = None;
        self.loads_in_flight = 0;
        self.epoch
    }

    /// Stop tracking; results of in-flight requests are ignored from now on
    pub fn deactivate(&mut self) {
        self.epoch += 1;
        self.match_id = None;
        self.snapshot = None;
        self.loads_in_flight = 0;
    }

    /// Mark a load as started. Returns the epoch to hand back to
    /// [`MatchStateStore::finish_load`] and the match to fetch.
    pub fn begin_load(&mut self) -> Option<(u64, String)> {
        let match_id = self.match_id.clone()?;
        self.loads_in_flight += 1;
        Some((self.epoch, match_id))
    }

    /// Apply a load result. Returns false when the result was stale and dropped.
    pub fn finish_load(&mut self, epoch: u64, result: Result<Match, ApiError>) -> bool {
        if !self.is_current(epoch) {
            debug!(epoch, current = self.epoch, "ignoring stale match load");
            return false;
        }

        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        match result {
            Ok(game_match) => {
                self.snapshot = Some(game_match);
                self.error = None;
            }
            Err(err) => {
                warn!(match_id = ?self.match_id, error = %err, "match load failed");
                self.error = Some(load_error_text(&err));
            }
        }
        true
    }

    pub fn apply_event(&mut self, event: &StreamEvent) -> StateChange {
        let match_id = self.match_id.as_deref().unwrap_or_default();
        let (patched, change) = reduce(self.snapshot.as_ref(), match_id, event);

        if let Some(snapshot) = patched {
            self.snapshot = Some(snapshot);
        }
        self.status = change.status.clone();
        change
    }

    /// Reflect how a move submission ended. Returns false when stale.
    pub fn record_submission(&mut self, epoch: u64, result: &Result<SubmitOutcome, ApiError>) -> bool {
        if !self.is_current(epoch) {
            debug!(epoch, current = self.epoch, "ignoring stale move submission");
            return false;
        }

        match result {
            Ok(SubmitOutcome::Accepted) => {
                self.status = SUBMITTED_STATUS.to_string();
                self.error = None;
            }
            Ok(SubmitOutcome::Rejected(rejection)) => {
                self.error = Some(rejection.to_string());
            }
            Err(err) => {
                warn!(error = %err, "move submission failed");
                self.error = Some(SUBMIT_NETWORK_ERROR.to_string());
            }
        }
        true
    }

    pub fn connection_lost(&mut self) {
        self.error = Some(STREAM_ERROR.to_string());
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.match_id.is_some() && epoch == self.epoch
    }

    pub fn match_id(&self) -> Option<&str> {
        self.match_id.as_deref()
    }

    pub fn snapshot(&self) -> Option<&Match> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight > 0
    }

    pub fn wins(&self) -> (u32, u32) {
        self.snapshot.as_ref().map(Match::wins).unwrap_or((0, 0))
    }
}
