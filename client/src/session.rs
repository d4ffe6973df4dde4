use std::sync::Arc;
use std::time::Duration;

use chifumi_common::{Match, RPSMove, TurnSelector};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::api::MatchApi;
use crate::error::ApiError;
use crate::event_stream::{ConnectionState, Delivery, EventStreamClient, EventTransport, StreamUpdate};
use crate::state::SessionState;
use crate::store::{MatchStateStore, StateChange};
use crate::submit::{MoveSubmitter, Rejection, SubmitOutcome};

/// What changed after [`MatchSession::next_update`] returned
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Event(StateChange),
    Loaded,
    Submitted,
    ConnectionLost,
}

/// Results of spawned requests, tagged with the epoch they were issued in
enum Completion {
    Loaded {
        epoch: u64,
        result: Result<Match, ApiError>,
    },
    Submitted {
        epoch: u64,
        result: Result<SubmitOutcome, ApiError>,
    },
}

/// Keeps one match live: seeds the store, follows the event stream, re-fetches
/// when asked to and runs move submissions. All state changes happen inside
/// [`MatchSession::next_update`], one at a time.
pub struct MatchSession<A: MatchApi, T: EventTransport> {
    api: Arc<A>,
    submitter: MoveSubmitter<A>,
    stream: EventStreamClient<T>,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    store: MatchStateStore,
}

impl<A: MatchApi, T: EventTransport> MatchSession<A, T> {
    pub fn new(session: &SessionState, api: Arc<A>, transport: Arc<T>, retry_delay: Duration) -> Self {
        let (stream, deliveries) = EventStreamClient::new(transport, retry_delay);
        let (completions_tx, completions) = mpsc::unbounded_channel();

        MatchSession {
            submitter: MoveSubmitter::new(api.clone(), session),
            api,
            stream,
            deliveries,
            completions_tx,
            completions,
            store: MatchStateStore::new(),
        }
    }

    /// Follow `match_id`, dropping whatever match was followed before
    pub async fn activate(&mut self, match_id: &str) {
        self.stream.close().await;
        let epoch = self.store.activate(match_id);
        info!(match_id, epoch, "match session activated");

        self.refresh();
        self.stream.attach(match_id).await;
    }

    pub async fn deactivate(&mut self) {
        self.store.deactivate();
        self.stream.close().await;
        info!("match session deactivated");
    }

    /// Start a full load of the current match
    pub fn refresh(&mut self) {
        let Some((epoch, match_id)) = self.store.begin_load() else {
            return;
        };

        let api = self.api.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_match(&match_id).await;
            let _ = completions.send(Completion::Loaded { epoch, result });
        });
    }

    /// Submit a move. Local precondition failures are reported right away and
    /// recorded on the store; otherwise the request runs in the background and
    /// its outcome shows up as [`SessionUpdate::Submitted`].
    pub fn play(&mut self, choice: RPSMove, turn: TurnSelector) -> Result<(), Rejection> {
        let epoch = self.store.epoch();

        let prepared = match self.submitter.prepare(&self.store, choice, turn) {
            Ok(prepared) => prepared,
            Err(rejection) => {
                self.store
                    .record_submission(epoch, &Ok(SubmitOutcome::Rejected(rejection.clone())));
                return Err(rejection);
            }
        };

        let submitter = self.submitter.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = submitter.send(prepared).await;
            let _ = completions.send(Completion::Submitted { epoch, result });
        });
        Ok(())
    }

    /// Wait for the next event, load or submission result and apply it
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            tokio::select! {
                Some(delivery) = self.deliveries.recv() => {
                    if !self.stream.is_current(&delivery) {
                        debug!(subscription = delivery.subscription, "dropping delivery from a closed subscription");
                        continue;
                    }

                    match delivery.update {
                        StreamUpdate::Event(event) => {
                            let change = self.store.apply_event(&event);
                            if change.refetch {
                                self.refresh();
                            }
                            return Some(SessionUpdate::Event(change));
                        }
                        StreamUpdate::Lost { .. } => {
                            self.store.connection_lost();
                            return Some(SessionUpdate::ConnectionLost);
                        }
                    }
                }
                Some(completion) = self.completions.recv() => {
                    match completion {
                        Completion::Loaded { epoch, result } => {
                            if self.store.finish_load(epoch, result) {
                                return Some(SessionUpdate::Loaded);
                            }
                        }
                        Completion::Submitted { epoch, result } => {
                            if self.store.record_submission(epoch, &result) {
                                return Some(SessionUpdate::Submitted);
                            }
                        }
                    }
                }
                else => return None,
            }
        }
    }

    pub fn store(&self) -> &MatchStateStore {
        &self.store
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    /// Follow connection state changes, e.g. to redraw a status line
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.stream.watch_state()
    }
}
