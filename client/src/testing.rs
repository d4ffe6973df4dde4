//! In-memory stand-ins for the REST endpoints and the event stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chifumi_common::{Match, PlayTurnRequest};
use futures_util::stream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::api::{MatchApi, PlayTurnReply};
use crate::error::{ApiError, StreamError};
use crate::event_stream::{EventTransport, FrameStream};

pub(crate) type FrameSender = mpsc::UnboundedSender<Result<String, StreamError>>;

/// What the next `open` call does
pub(crate) enum Script {
    Refuse(u16),
    /// Yields these frames, then ends
    Frames(Vec<Result<String, StreamError>>),
    /// Stays open and yields whatever the test sends
    Live(mpsc::UnboundedReceiver<Result<String, StreamError>>),
}

impl Script {
    pub(crate) fn live() -> (FrameSender, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Script::Live(rx))
    }
}

/// Plays scripts in order; once they run out every connection stays open and silent
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opened: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            scripts: Mutex::new(scripts.into()),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.opened.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub(crate) fn opened_for(&self) -> Vec<String> {
        self.opened.lock().unwrap().iter().map(|(_, id)| id.clone()).collect()
    }
}

impl EventTransport for ScriptedTransport {
    async fn open(&self, match_id: &str) -> Result<FrameStream, StreamError> {
        self.opened.lock().unwrap().push((Instant::now(), match_id.to_string()));
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Refuse(status)) => Err(StreamError::Rejected(status)),
            Some(Script::Frames(frames)) => Ok(Box::pin(stream::iter(frames))),
            Some(Script::Live(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            }))),
            None => Ok(Box::pin(stream::pending::<Result<String, StreamError>>())),
        }
    }
}

/// Serves a fixed snapshot (with the requested id) and a fixed submission reply
pub(crate) struct FakeMatchApi {
    snapshot: Mutex<Result<Match, ApiError>>,
    reply: Mutex<Result<PlayTurnReply, ApiError>>,
    fetch_delay: Mutex<Duration>,
    fetches: AtomicUsize,
    submissions: Mutex<Vec<(String, String, PlayTurnRequest)>>,
}

impl FakeMatchApi {
    pub(crate) fn new(snapshot: Match) -> Arc<Self> {
        Arc::new(FakeMatchApi {
            snapshot: Mutex::new(Ok(snapshot)),
            reply: Mutex::new(Ok(PlayTurnReply::Accepted)),
            fetch_delay: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn from_json(json: &str) -> Arc<Self> {
        Self::new(serde_json::from_str(json).unwrap())
    }

    pub(crate) fn set_snapshot(&self, snapshot: Result<Match, ApiError>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub(crate) fn set_reply(&self, reply: Result<PlayTurnReply, ApiError>) {
        *self.reply.lock().unwrap() = reply;
    }

    pub(crate) fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn submissions(&self) -> Vec<(String, String, PlayTurnRequest)> {
        self.submissions.lock().unwrap().clone()
    }
}

impl MatchApi for FakeMatchApi {
    async fn fetch_match(&self, match_id: &str) -> Result<Match, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let snapshot = self.snapshot.lock().unwrap().clone();
        snapshot.map(|mut game_match| {
            game_match.id = match_id.to_string();
            game_match
        })
    }

    async fn play_turn(
        &self,
        match_id: &str,
        turn_id: &str,
        request: &PlayTurnRequest,
    ) -> Result<PlayTurnReply, ApiError> {
        self.submissions
            .lock()
            .unwrap()
            .push((match_id.to_string(), turn_id.to_string(), request.clone()));
        self.reply.lock().unwrap().clone()
    }
}
