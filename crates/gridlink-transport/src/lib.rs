//! Transport connection management for Gridlink.
//!
//! This crate owns the client's single outbound connection to a world
//! server. It provides:
//!
//! - **Types** ([`TransportKind`], [`CandidateEndpoint`], [`ConnectionState`],
//!   [`InboundMessage`]) — the vocabulary of the connection layer.
//! - **Seam traits** ([`Connection`], [`Connector`]) — what the manager
//!   needs from an actual network stack. Production code uses
//!   [`SocketConnector`]; tests script their own.
//! - **The manager** ([`ConnectionManager`]) — candidate rotation, timed
//!   reconnection, and inbound message dispatch, driven from a cooperative
//!   tick loop.
//!
//! # How it fits in the stack
//!
//! ```text
//! Login Orchestrator (above)  ← tells the manager which server to reach
//!     ↕
//! Connection Manager (this crate)  ← keeps one connection alive, retries
//!     ↕
//! Sockets (below)  ← tokio UDP/TCP, driven on background tasks
//! ```
//!
//! The manager never interprets message payloads. Decoded application
//! semantics belong to whoever subscribes to the inbound channel.

mod error;
mod manager;
mod socket;

pub use error::TransportError;
pub use manager::{ConnectionManager, TransportConfig};
pub use socket::{SocketConnection, SocketConnector};

use std::fmt;

/// The kind of socket a candidate endpoint uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Datagram transport. First choice — lower latency, NAT-friendlier.
    Udp,
    /// Stream transport, used as the fallback on the same port.
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// One (transport kind, port) pair considered for connection.
///
/// Candidates are immutable and drawn from a fixed ordered table; the
/// manager cycles through them with wraparound on each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateEndpoint {
    /// Socket kind to connect with.
    pub kind: TransportKind,
    /// Destination port on the server.
    pub port: u16,
}

impl fmt::Display for CandidateEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.port)
    }
}

/// The default candidate table: the well-known world-server port over UDP
/// first, then the same port over TCP.
pub const DEFAULT_CANDIDATES: &[CandidateEndpoint] = &[
    CandidateEndpoint {
        kind: TransportKind::Udp,
        port: 2345,
    },
    CandidateEndpoint {
        kind: TransportKind::Tcp,
        port: 2345,
    },
];

/// Observed state of a connection.
///
/// ```text
/// Disconnected → Connecting → Connected → Closing → Closed
/// ```
///
/// Transitions are driven by the underlying transport's own connect and
/// disconnect notifications; the manager treats them as inputs. `Closed`
/// and a stalled `Connecting` are the states that put the manager on its
/// retry path; `Connected` suspends the reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt has been made.
    Disconnected,
    /// An attempt has been submitted to the transport and is pending.
    Connecting,
    /// The connection is live; messages flow.
    Connected,
    /// A close has been requested but not yet observed.
    Closing,
    /// The connection is gone. Terminal for one connection object.
    Closed,
}

/// A byte message received from the server, keyed by its numeric
/// message identifier. Payload semantics are the consumer's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Numeric message identifier from the wire.
    pub id: u32,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// A single live transport session.
///
/// Implementations must never block: `try_recv` polls, `send` enqueues,
/// and `close` only requests teardown. State changes surface through
/// [`Connection::state`] as the transport observes them.
pub trait Connection: Send + 'static {
    /// Returns the current observed state.
    fn state(&self) -> ConnectionState;

    /// Enqueues one message for delivery.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the connection can
    /// no longer accept messages.
    fn send(&self, id: u32, payload: &[u8]) -> Result<(), TransportError>;

    /// Polls for the next inbound message, if one has arrived.
    ///
    /// Messages are yielded in arrival order for the life of this
    /// connection. A message in flight during teardown is dropped.
    fn try_recv(&mut self) -> Option<InboundMessage>;

    /// Requests teardown. Idempotent.
    fn close(&mut self);
}

/// Produces connections for the manager.
///
/// `connect` must not block the caller: it either fails fast (e.g. the
/// address cannot be resolved at all) or returns a connection whose
/// establishment is tracked asynchronously through its state.
pub trait Connector: Send + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Starts a connection attempt to `host` using the given candidate.
    ///
    /// # Errors
    /// Returns an error only when an attempt cannot even be started; a
    /// failed handshake surfaces later as [`ConnectionState::Closed`].
    fn connect(
        &self,
        host: &str,
        candidate: CandidateEndpoint,
    ) -> Result<Self::Connection, TransportError>;
}
