use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chifumi_common::{StreamEvent, HEADER_AUTH};
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::ACCEPT;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::sse::{SseDecoder, SseFrame};
use crate::state::SessionState;

/// Raw `data` payloads of one open subscription, in delivery order
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Opens the per-match push channel
pub trait EventTransport: Send + Sync + 'static {
    fn open(&self, match_id: &str) -> impl Future<Output = Result<FrameStream, StreamError>> + Send;
}

/// `GET /matches/{id}/subscribe` read as server-sent events
pub struct HttpEventTransport {
    client: reqwest::Client,
    session: SessionState,
}

impl HttpEventTransport {
    pub fn new(session: SessionState) -> Self {
        HttpEventTransport {
            client: reqwest::Client::new(),
            session,
        }
    }
}

impl EventTransport for HttpEventTransport {
    async fn open(&self, match_id: &str) -> Result<FrameStream, StreamError> {
        let url = self.session.url(&format!("/matches/{match_id}/subscribe"));

        let response = self
            .client
            .get(&url)
            .header(HEADER_AUTH, self.session.authorization())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::Rejected(response.status().as_u16()));
        }

        let body = Box::pin(response.bytes_stream());
        let frames = stream::unfold(
            (body, SseDecoder::default(), VecDeque::new()),
            |(mut body, mut decoder, mut pending)| async move {
                loop {
                    if let Some(data) = pending.pop_front() {
                        return Some((Ok(data), (body, decoder, pending)));
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => {
                            let frames = decoder.push(&chunk);
                            pending.extend(frames.into_iter().filter(SseFrame::is_message).map(|f| f.data));
                        }
                        Some(Err(err)) => {
                            return Some((Err(StreamError::from(err)), (body, decoder, pending)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(frames))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the retry delay after a transport error
    Reconnecting,
    /// Torn down on request; never reconnects
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Event(StreamEvent),
    /// The connection dropped; a new attempt follows after `retry_in`
    Lost { retry_in: Duration },
}

/// An update tagged with the subscription that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub subscription: u64,
    pub update: StreamUpdate,
}

struct Subscription {
    id: u64,
    match_id: String,
    task: JoinHandle<()>,
}

/// Keeps at most one live subscription and reconnects it after failures.
///
/// The reconnect timer lives inside the subscription task, so aborting the
/// task on [`EventStreamClient::close`] also cancels a pending retry.
pub struct EventStreamClient<T: EventTransport> {
    transport: Arc<T>,
    retry_delay: Duration,
    deliveries: mpsc::UnboundedSender<Delivery>,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Option<Subscription>,
    next_id: u64,
}

impl<T: EventTransport> EventStreamClient<T> {
    pub fn new(transport: Arc<T>, retry_delay: Duration) -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        let client = EventStreamClient {
            transport,
            retry_delay,
            deliveries: tx,
            state: Arc::new(state),
            active: None,
            next_id: 0,
        };
        (client, rx)
    }

    /// Subscribe to `match_id`, tearing down any existing subscription first.
    /// Returns the id carried by every delivery of the new subscription.
    pub async fn attach(&mut self, match_id: &str) -> u64 {
        self.close().await;

        self.next_id += 1;
        let id = self.next_id;
        self.state.send_replace(ConnectionState::Disconnected);

        let link = Link {
            id,
            match_id: match_id.to_string(),
            transport: self.transport.clone(),
            retry_delay: self.retry_delay,
            deliveries: self.deliveries.clone(),
            state: self.state.clone(),
        };
        let task = tokio::spawn(link.run());

        info!(subscription = id, match_id, "event stream attached");
        self.active = Some(Subscription {
            id,
            match_id: match_id.to_string(),
            task,
        });
        id
    }

    /// Close the active subscription. Once this returns the transport is
    /// dropped and no reconnect can fire.
    pub async fn close(&mut self) {
        if let Some(subscription) = self.active.take() {
            subscription.task.abort();
            let _ = subscription.task.await;
            self.state.send_replace(ConnectionState::Closed);
            info!(
                subscription = subscription.id,
                match_id = %subscription.match_id,
                "event stream closed"
            );
        }
    }

    pub fn active_subscription(&self) -> Option<u64> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Whether `delivery` comes from the live subscription rather than a replaced one
    pub fn is_current(&self, delivery: &Delivery) -> bool {
        self.active_subscription() == Some(delivery.subscription)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl<T: EventTransport> Drop for EventStreamClient<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.active.take() {
            subscription.task.abort();
        }
    }
}

/// Everything a subscription task needs, moved into it
struct Link<T> {
    id: u64,
    match_id: String,
    transport: Arc<T>,
    retry_delay: Duration,
    deliveries: mpsc::UnboundedSender<Delivery>,
    state: Arc<watch::Sender<ConnectionState>>,
}

type ReceiverGone = mpsc::error::SendError<Delivery>;

impl<T: EventTransport> Link<T> {
    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            self.state.send_replace(ConnectionState::Connecting);

            match self.transport.open(&self.match_id).await {
                Ok(frames) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!(subscription = self.id, match_id = %self.match_id, attempt, "event stream connected");
                    attempt = 0;

                    if self.pump(frames).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(subscription = self.id, match_id = %self.match_id, error = %err, "event stream connect failed");
                }
            }

            attempt += 1;
            self.state.send_replace(ConnectionState::Reconnecting);
            if self.deliver(StreamUpdate::Lost { retry_in: self.retry_delay }).is_err() {
                return;
            }

            debug!(subscription = self.id, attempt, delay = ?self.retry_delay, "scheduling reconnect");
            sleep(self.retry_delay).await;
        }
    }

    /// Forward decoded events until the stream fails or ends
    async fn pump(&self, mut frames: FrameStream) -> Result<(), ReceiverGone> {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(data) => match StreamEvent::decode(&data) {
                    Ok(event) => {
                        debug!(subscription = self.id, kind = event.kind(), "event received");
                        self.deliver(StreamUpdate::Event(event))?;
                    }
                    Err(err) => {
                        warn!(subscription = self.id, error = %err, "skipping malformed event");
                    }
                },
                Err(err) => {
                    warn!(subscription = self.id, error = %err, "event stream failed");
                    return Ok(());
                }
            }
        }

        warn!(subscription = self.id, "event stream ended by server");
        Ok(())
    }

    fn deliver(&self, update: StreamUpdate) -> Result<(), ReceiverGone> {
        self.deliveries.send(Delivery {
            subscription: self.id,
            update,
        })
    }
}
