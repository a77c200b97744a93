//! Network session: one reconnecting websocket to the room server.
//!
//! DESIGN
//! ======
//! The session is split in two:
//! - a driver task that owns the socket and runs the connect / pump /
//!   back off loop, forwarding decoded inbound messages and status changes on
//!   an event channel;
//! - a cloneable [`SessionHandle`] the event loop uses to send and to read the
//!   link state.
//!
//! STATE MACHINE
//! =============
//! ```text
//! Connecting --open--> Online --close/error--> Offline --schedule--> Reconnecting --delay--> Connecting
//!      \------------------connect error---------^
//! ```
//! A connect error is treated as an immediate close; there is no separate
//! error state. The retry counter grows on every scheduled retry and resets to
//! zero on `Online`. Only `Offline` can schedule, so at most one reconnect is
//! ever pending.
//!
//! SENDING
//! =======
//! Every `Online` transition starts a new connection generation. Status
//! events carry the generation they were published under, and readiness can
//! only be set for the generation that is live, so a snapshot still queued
//! from a dead socket never unlocks edits on its successor.
//!
//! [`SessionHandle::send`] drops the message unless the link is `Online`.
//! There is no queue: anything still buffered when a socket dies is discarded
//! before the next connection opens, and the room is resynced from the
//! `room-joined` snapshot instead.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::consts;
use crate::error::SyncError;
use crate::net::types::{Inbound, Outbound, decode, encode};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport status of the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Handshake in progress.
    Connecting,
    /// Socket open; sends go out.
    Online,
    /// Socket closed; a reconnect is about to be scheduled.
    #[default]
    Offline,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
}

/// Linear reconnect backoff: `min(base + retries * step, cap)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(consts::BACKOFF_BASE_MS),
            step: Duration::from_millis(consts::BACKOFF_STEP_MS),
            cap: Duration::from_millis(consts::BACKOFF_CAP_MS),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt following `retry_count` failures.
    #[must_use]
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.base.saturating_add(self.step.saturating_mul(retry_count)).min(self.cap)
    }
}

/// Pure reconnect state machine driven by transport events.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: ConnectionStatus,
    retry_count: u32,
    policy: BackoffPolicy,
}

impl Lifecycle {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { status: ConnectionStatus::Offline, retry_count: 0, policy }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// A connection attempt is starting.
    pub fn begin_connect(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// The socket opened.
    pub fn opened(&mut self) {
        self.status = ConnectionStatus::Online;
        self.retry_count = 0;
    }

    /// The socket closed or failed to open. Returns `false` when already
    /// closed, so duplicate close signals are harmless.
    pub fn closed(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connecting | ConnectionStatus::Online => {
                self.status = ConnectionStatus::Offline;
                true
            }
            ConnectionStatus::Offline | ConnectionStatus::Reconnecting => false,
        }
    }

    /// Schedule the next attempt. Returns the delay to wait, or `None` unless
    /// the session is `Offline`.
    pub fn schedule_reconnect(&mut self) -> Option<Duration> {
        if self.status != ConnectionStatus::Offline {
            return None;
        }
        let delay = self.policy.delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = ConnectionStatus::Reconnecting;
        Some(delay)
    }
}

/// Shared view of the link: transport status plus room readiness.
///
/// `ready` is set once the room snapshot has been loaded on the current
/// connection and is cleared by every status transition. `generation` counts
/// the `Online` transitions so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Link {
    pub status: ConnectionStatus,
    pub ready: bool,
    pub generation: u64,
}

impl Link {
    fn transition(&mut self, status: ConnectionStatus) {
        if status == ConnectionStatus::Online {
            self.generation = self.generation.wrapping_add(1);
        }
        self.status = status;
        self.ready = false;
    }

    /// Whether connection `generation` is the one online now.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.status == ConnectionStatus::Online && self.generation == generation
    }

    /// Whether edits may be broadcast: online and the room is initialized.
    #[must_use]
    pub fn can_broadcast(&self) -> bool {
        self.status == ConnectionStatus::Online && self.ready
    }
}

/// What the driver reports to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A transition, with the link generation it left behind.
    Status { status: ConnectionStatus, generation: u64 },
    Message(Inbound),
}

/// Cloneable handle for sending and reading link state.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    link: Arc<watch::Sender<Link>>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    fn with_channel(outbound: mpsc::UnboundedSender<String>) -> Self {
        let (link, _) = watch::channel(Link::default());
        Self { link: Arc::new(link), outbound, shutdown: Arc::new(Notify::new()) }
    }

    /// A handle with no driver behind it. Status stays `Offline` until set
    /// explicitly; sent text lands on the returned receiver.
    #[must_use]
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_channel(tx), rx)
    }

    #[must_use]
    pub fn link(&self) -> Link {
        *self.link.borrow()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.link().status
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status() == ConnectionStatus::Online
    }

    #[must_use]
    pub fn can_broadcast(&self) -> bool {
        self.link().can_broadcast()
    }

    /// Watch link changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Link> {
        self.link.subscribe()
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.link().is_current(generation)
    }

    /// Mark the room initialized on connection `generation`. Returns `false`,
    /// changing nothing, unless that connection is the one online now.
    pub fn mark_ready(&self, generation: u64) -> bool {
        self.link.send_if_modified(|link| {
            if !link.is_current(generation) {
                return false;
            }
            link.ready = true;
            true
        })
    }

    /// Record a status transition. Readiness is reset and `Online` starts a
    /// new generation.
    pub fn set_status(&self, status: ConnectionStatus) {
        self.link.send_modify(|link| link.transition(status));
    }

    /// Send a message if online. Returns `false` when it was dropped.
    pub fn send(&self, message: &Outbound) -> bool {
        if !self.is_online() {
            debug!(?message, "session: dropping send while not online");
            return false;
        }
        match encode(message) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                warn!(error = %e, "session: failed to encode outbound message");
                false
            }
        }
    }

    /// Tear the session down. The driver exits at its next await point.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }
}

/// Spawn the session driver for `url`.
///
/// Returns the handle, the receiver for [`SessionEvent`]s, and the driver task.
#[must_use]
pub fn spawn_session(
    url: String,
    policy: BackoffPolicy,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>, JoinHandle<()>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle::with_channel(outbound_tx);

    let driver = Driver {
        url,
        lifecycle: Lifecycle::new(policy),
        link: Arc::clone(&handle.link),
        shutdown: Arc::clone(&handle.shutdown),
        outbound: outbound_rx,
        events: events_tx,
    };
    let task = tokio::spawn(driver.run());
    (handle, events_rx, task)
}

enum Exit {
    Closed,
    Shutdown,
}

struct Driver {
    url: String,
    lifecycle: Lifecycle,
    link: Arc<watch::Sender<Link>>,
    shutdown: Arc<Notify>,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.lifecycle.begin_connect();
            self.publish();
            info!(url = %self.url, "session: connecting");

            let attempt = tokio::select! {
                result = connect_async(self.url.as_str()) => Some(result),
                () = self.shutdown.notified() => None,
            };
            let exit = match attempt {
                None => Exit::Shutdown,
                Some(Ok((stream, _))) => {
                    self.discard_stale_sends();
                    self.lifecycle.opened();
                    self.publish();
                    info!(url = %self.url, "session: online");
                    self.pump(stream).await
                }
                Some(Err(e)) => {
                    let error = SyncError::from(e);
                    warn!(%error, url = %self.url, "session: connect failed");
                    Exit::Closed
                }
            };

            if self.lifecycle.closed() {
                self.publish();
            }
            if matches!(exit, Exit::Shutdown) {
                break;
            }

            let Some(delay) = self.lifecycle.schedule_reconnect() else {
                continue;
            };
            self.publish();
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                retry = self.lifecycle.retry_count(),
                "session: reconnect scheduled"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.notified() => break,
            }
        }

        self.link.send_modify(|link| link.transition(ConnectionStatus::Offline));
        info!(url = %self.url, "session: torn down");
    }

    async fn pump(&mut self, stream: WsStream) -> Exit {
        let (mut sink, mut source) = stream.split();
        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.deliver(text),
                        Err(e) => warn!(error = %e, "session: dropping non-utf8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("session: closed by peer");
                        return Exit::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let error = SyncError::from(e);
                        warn!(%error, "session: read failed");
                        return Exit::Closed;
                    }
                },
                outgoing = self.outbound.recv() => {
                    let Some(text) = outgoing else {
                        return Exit::Shutdown;
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let error = SyncError::from(e);
                        warn!(%error, "session: write failed");
                        return Exit::Closed;
                    }
                }
                () = self.shutdown.notified() => {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "session: close handshake failed");
                    }
                    return Exit::Shutdown;
                }
            }
        }
    }

    fn deliver(&self, text: &str) {
        match decode(text) {
            Ok(Inbound::Unknown) => debug!("session: ignoring unknown message tag"),
            Ok(message) => self.emit(SessionEvent::Message(message)),
            Err(e) => warn!(error = %e, "session: dropping malformed inbound message"),
        }
    }

    fn discard_stale_sends(&mut self) {
        let mut dropped = 0_usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "session: discarded sends from previous connection");
        }
    }

    fn publish(&self) {
        let status = self.lifecycle.status();
        let mut generation = 0;
        self.link.send_modify(|link| {
            link.transition(status);
            generation = link.generation;
        });
        self.emit(SessionEvent::Status { status, generation });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("session: event receiver dropped");
        }
    }
}
