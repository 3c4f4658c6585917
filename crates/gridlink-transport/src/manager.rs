//! The connection manager: one live connection, rotating candidates,
//! timed reconnection.
//!
//! This is the central piece of the transport layer. It's responsible for:
//! - Opening the single outbound connection to the world server
//! - Rotating through the candidate endpoint table on failed attempts
//! - Re-arming a fixed-delay reconnect timer while the server is down
//! - Draining inbound messages and fanning them out to subscribers
//!
//! # Concurrency note
//!
//! `ConnectionManager` is NOT thread-safe by itself and has no internal
//! threads. It is owned by a single cooperative tick loop that calls
//! [`ConnectionManager::update`] once per pass; network I/O behind the
//! [`Connector`] seam runs elsewhere (tokio tasks in the socket
//! implementation) so that `update` never blocks.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::{
    CandidateEndpoint, Connection, ConnectionState, Connector,
    DEFAULT_CANDIDATES, InboundMessage,
};

/// Configuration for connection behavior.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Delay between reconnection attempts. The timer is single-shot and
    /// re-armed with this same value after every firing — uniform backoff
    /// is intentional, there is no exponential growth.
    ///
    /// Default: 5000 ms.
    pub reconnect_delay: Duration,

    /// Ordered candidate endpoint table, tried round-robin with
    /// wraparound. Default: [`DEFAULT_CANDIDATES`].
    pub candidates: Vec<CandidateEndpoint>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            candidates: DEFAULT_CANDIDATES.to_vec(),
        }
    }
}

/// Owns at most one outbound connection and keeps it alive.
///
/// ## Lifecycle
///
/// ```text
/// connect(host) ──→ [attempt candidate 0] ──→ Connected
///                         │ (failure observed in update)
///                         ▼
///                   arm timer (5 s) ──fires──→ advance candidate, retry
///                         ▲                          │
///                         └──────────────────────────┘
/// disconnect() ──→ close, index := 0, forget host (retries stop)
/// ```
///
/// Generic over the [`Connector`] seam so tests can script connection
/// outcomes without touching the network.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: TransportConfig,

    /// Remembered destination host. `None` disarms automatic
    /// reconnection entirely — the retry path requires a stored target.
    server_host: Option<String>,

    /// The single live connection, if any. Replacing it requires closing
    /// the previous one first.
    connection: Option<C::Connection>,

    /// Index into `config.candidates` for the next attempt.
    next_candidate: usize,

    /// Single-shot reconnect deadline. `None` means unarmed.
    reconnect_at: Option<Instant>,

    /// Subscriber channels for inbound messages. Dispatch preserves
    /// arrival order per connection; closed subscribers are dropped.
    subscribers: Vec<mpsc::UnboundedSender<InboundMessage>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager with the given connector and config.
    pub fn new(connector: C, config: TransportConfig) -> Self {
        Self {
            connector,
            config,
            server_host: None,
            connection: None,
            next_candidate: 0,
            reconnect_at: None,
            subscribers: Vec::new(),
        }
    }

    /// Registers a consumer for inbound messages.
    ///
    /// Each subscriber receives every message. No ordering guarantee
    /// exists across reconnections.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Records `host` as the target and immediately starts an attempt.
    ///
    /// Re-issuing `connect` with the host we are already connected to is
    /// a no-op. A different host forces teardown of the existing
    /// connection first. Never blocks: the attempt is tracked through the
    /// connection's state.
    pub fn connect(&mut self, host: &str) {
        let already_connected = self.is_connected()
            && self.server_host.as_deref() == Some(host);
        if already_connected {
            tracing::debug!(host, "already connected, ignoring connect");
            return;
        }

        // A different target while connected gets full disconnect
        // semantics first, candidate-index reset included.
        if self.connection.is_some()
            && self.server_host.as_deref() != Some(host)
        {
            self.disconnect();
        }

        self.server_host = Some(host.to_string());
        self.reconnect_at = None;
        self.attempt_connection();
    }

    /// Closes any live connection and cancels future reconnection.
    ///
    /// Clearing the stored target is what disarms the retry path; an
    /// attempt already submitted to the transport is not forcibly
    /// aborted, it just never gets resubmitted.
    pub fn disconnect(&mut self) {
        self.close_connection();
        self.next_candidate = 0;
        self.reconnect_at = None;
        self.server_host = None;
    }

    /// Cooperative tick: drains inbound messages and services the
    /// reconnect timer. Call once per scheduler pass.
    pub fn update(&mut self) {
        // Pull all new inbound messages and fan them out before touching
        // connection state.
        if let Some(conn) = &mut self.connection {
            while let Some(msg) = conn.try_recv() {
                Self::dispatch(&mut self.subscribers, msg);
            }
        }

        let Some(host) = self.server_host.clone() else {
            return;
        };

        // Closed, or still pending with no progress, are the retry
        // states. Connected suspends the timer.
        let needs_retry = match &self.connection {
            None => true,
            Some(conn) => matches!(
                conn.state(),
                ConnectionState::Closed | ConnectionState::Connecting
            ),
        };

        if !needs_retry {
            self.reconnect_at = None;
            return;
        }

        match self.reconnect_at {
            Some(deadline) if Instant::now() >= deadline => {
                self.reconnect_at = None;
                self.next_candidate =
                    (self.next_candidate + 1) % self.config.candidates.len();
                tracing::debug!(
                    host,
                    candidate = %self.config.candidates[self.next_candidate],
                    "reconnect timer fired, trying next candidate"
                );
                self.attempt_connection();
            }
            Some(_) => {}
            None => {
                self.reconnect_at =
                    Some(Instant::now() + self.config.reconnect_delay);
            }
        }
    }

    /// Enqueues a message on the live connection.
    ///
    /// Dropped with a warning if no connection exists — transport loss is
    /// never fatal to the caller.
    pub fn send_message(&mut self, id: u32, payload: &[u8]) {
        match &self.connection {
            Some(conn) if conn.state() == ConnectionState::Connected => {
                if let Err(e) = conn.send(id, payload) {
                    tracing::warn!(id, error = %e, "send failed");
                }
            }
            _ => {
                tracing::warn!(id, "no live connection, dropping message");
            }
        }
    }

    /// Observed state of the current connection, or `Disconnected` if
    /// none exists.
    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// True when the connection is live.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Index of the candidate the next attempt will use.
    pub fn current_candidate(&self) -> usize {
        self.next_candidate
    }

    fn attempt_connection(&mut self) {
        self.close_connection();

        let Some(host) = self.server_host.clone() else {
            return;
        };
        let candidate = self.config.candidates[self.next_candidate];

        match self.connector.connect(&host, candidate) {
            Ok(conn) => {
                tracing::info!(host, %candidate, "connection attempt started");
                self.connection = Some(conn);
            }
            Err(e) => {
                // Not fatal: the retry path arms the timer on the next
                // update pass.
                tracing::warn!(host, %candidate, error = %e, "unable to connect");
            }
        }
    }

    fn close_connection(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
    }

    fn dispatch(
        subscribers: &mut Vec<mpsc::UnboundedSender<InboundMessage>>,
        msg: InboundMessage,
    ) {
        subscribers.retain(|tx| tx.send(msg.clone()).is_ok());
    }
}
