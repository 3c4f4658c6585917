//! Socket-backed connector using tokio UDP and TCP.
//!
//! All I/O runs on spawned tasks; the [`Connection`] handed back to the
//! manager only pushes into and polls unbounded channels, so the tick
//! loop never blocks on the network.
//!
//! Wire framing is deliberately minimal: messages are bytes keyed by a
//! numeric id. On TCP each frame is `[len: u32 LE][id: u32 LE][payload]`
//! where `len` covers the id and payload; on UDP each datagram is
//! `[id: u32 LE][payload]`.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{Notify, mpsc};

use crate::{
    CandidateEndpoint, Connection, ConnectionState, Connector,
    InboundMessage, TransportError, TransportKind,
};

/// Largest payload accepted on a single message. Oversized frames are
/// treated as a protocol violation and close the connection.
const MAX_PAYLOAD_BYTES: u32 = 16 * 1024 * 1024;

/// A [`Connector`] that opens real sockets.
///
/// Must be used from within a tokio runtime: connection establishment
/// and I/O are `tokio::spawn`ed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    type Connection = SocketConnection;

    fn connect(
        &self,
        host: &str,
        candidate: CandidateEndpoint,
    ) -> Result<SocketConnection, TransportError> {
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(
                "empty host".to_string(),
            ));
        }

        let addr = format!("{}:{}", host, candidate.port);
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let shutdown = Arc::new(Notify::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let task_state = Arc::clone(&state);
        let task_shutdown = Arc::clone(&shutdown);
        match candidate.kind {
            TransportKind::Tcp => {
                tokio::spawn(run_tcp(
                    addr,
                    task_state,
                    task_shutdown,
                    outbound_rx,
                    inbound_tx,
                ));
            }
            TransportKind::Udp => {
                tokio::spawn(run_udp(
                    addr,
                    task_state,
                    task_shutdown,
                    outbound_rx,
                    inbound_tx,
                ));
            }
        }

        Ok(SocketConnection {
            state,
            shutdown,
            outbound_tx,
            inbound_rx,
        })
    }
}

/// A single socket connection driven by background tasks.
pub struct SocketConnection {
    state: Arc<Mutex<ConnectionState>>,
    shutdown: Arc<Notify>,
    outbound_tx: mpsc::UnboundedSender<(u32, Vec<u8>)>,
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Connection for SocketConnection {
    fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    fn send(&self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        self.outbound_tx
            .send((id, payload.to_vec()))
            .map_err(|_| {
                TransportError::ConnectionClosed(
                    "writer task gone".to_string(),
                )
            })
    }

    fn try_recv(&mut self) -> Option<InboundMessage> {
        self.inbound_rx.try_recv().ok()
    }

    fn close(&mut self) {
        set_state(&self.state, ConnectionState::Closing);
        self.shutdown.notify_waiters();
        self.shutdown.notify_one();
    }
}

fn set_state(state: &Arc<Mutex<ConnectionState>>, new: ConnectionState) {
    let mut guard = state.lock().expect("state lock poisoned");
    // Closed is terminal for a connection object.
    if *guard != ConnectionState::Closed {
        *guard = new;
    }
}

async fn run_tcp(
    addr: String,
    state: Arc<Mutex<ConnectionState>>,
    shutdown: Arc<Notify>,
    mut outbound_rx: mpsc::UnboundedReceiver<(u32, Vec<u8>)>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
) {
    let stream = tokio::select! {
        _ = shutdown.notified() => {
            set_state(&state, ConnectionState::Closed);
            return;
        }
        res = TcpStream::connect(&addr) => match res {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!(addr, error = %e, "tcp connect failed");
                set_state(&state, ConnectionState::Closed);
                return;
            }
        },
    };

    tracing::debug!(addr, "tcp connection established");
    set_state(&state, ConnectionState::Connected);
    let (mut rd, mut wr) = stream.into_split();

    let writer_shutdown = Arc::clone(&shutdown);
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_shutdown.notified() => break,
                msg = outbound_rx.recv() => {
                    let Some((id, payload)) = msg else { break };
                    let frame = encode_tcp_frame(id, &payload);
                    if wr.write_all(&frame).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = wr.shutdown().await;
    });

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            res = read_tcp_frame(&mut rd) => match res {
                Ok(Some((id, payload))) => {
                    if inbound_tx
                        .send(InboundMessage { id, payload })
                        .is_err()
                    {
                        break; // receiver side dropped
                    }
                }
                Ok(None) => break, // clean EOF
                Err(e) => {
                    tracing::debug!(addr, error = %e, "tcp read failed");
                    break;
                }
            },
        }
    }

    set_state(&state, ConnectionState::Closed);
    writer.abort();
}

async fn run_udp(
    addr: String,
    state: Arc<Mutex<ConnectionState>>,
    shutdown: Arc<Notify>,
    mut outbound_rx: mpsc::UnboundedReceiver<(u32, Vec<u8>)>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
) {
    let socket = match bind_udp(&addr).await {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            tracing::debug!(addr, error = %e, "udp connect failed");
            set_state(&state, ConnectionState::Closed);
            return;
        }
    };

    // Datagram sockets have no handshake; consider the session live as
    // soon as the local socket is bound and the peer recorded.
    tracing::debug!(addr, "udp socket connected");
    set_state(&state, ConnectionState::Connected);

    let writer_socket = Arc::clone(&socket);
    let writer_shutdown = Arc::clone(&shutdown);
    let writer = tokio::spawn(async move {
        while let Some(msg) = tokio::select! {
            _ = writer_shutdown.notified() => None,
            msg = outbound_rx.recv() => msg,
        } {
            let (id, payload) = msg;
            let datagram = encode_datagram(id, &payload);
            if writer_socket.send(&datagram).await.is_err() {
                break;
            }
        }
    });

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let len = tokio::select! {
            _ = shutdown.notified() => break,
            res = socket.recv(&mut buf) => match res {
                Ok(len) => len,
                Err(e) => {
                    tracing::debug!(addr, error = %e, "udp recv failed");
                    break;
                }
            },
        };
        match decode_datagram(&buf[..len]) {
            Some((id, payload)) => {
                if inbound_tx
                    .send(InboundMessage { id, payload })
                    .is_err()
                {
                    break;
                }
            }
            None => {
                tracing::debug!(addr, len, "runt datagram dropped");
            }
        }
    }

    set_state(&state, ConnectionState::Closed);
    writer.abort();
}

async fn bind_udp(addr: &str) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(addr).await?;
    Ok(socket)
}

fn encode_tcp_frame(id: u32, payload: &[u8]) -> Vec<u8> {
    let len = 4 + payload.len() as u32;
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reads one length-prefixed frame. `Ok(None)` means clean EOF at a
/// frame boundary.
async fn read_tcp_frame(
    rd: &mut (impl AsyncReadExt + Unpin),
) -> io::Result<Option<(u32, Vec<u8>)>> {
    let mut len_buf = [0u8; 4];
    match rd.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_buf);
    if len < 4 || len - 4 > MAX_PAYLOAD_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad frame length {len}"),
        ));
    }

    let mut id_buf = [0u8; 4];
    rd.read_exact(&mut id_buf).await?;
    let mut payload = vec![0u8; (len - 4) as usize];
    rd.read_exact(&mut payload).await?;
    Ok(Some((u32::from_le_bytes(id_buf), payload)))
}

fn encode_datagram(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(4 + payload.len());
    datagram.extend_from_slice(&id.to_le_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

fn decode_datagram(data: &[u8]) -> Option<(u32, Vec<u8>)> {
    if data.len() < 4 {
        return None;
    }
    let id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Some((id, data[4..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_roundtrip() {
        let datagram = encode_datagram(42, b"hello");
        assert_eq!(decode_datagram(&datagram), Some((42, b"hello".to_vec())));
    }

    #[test]
    fn test_datagram_empty_payload() {
        let datagram = encode_datagram(7, b"");
        assert_eq!(datagram.len(), 4);
        assert_eq!(decode_datagram(&datagram), Some((7, Vec::new())));
    }

    #[test]
    fn test_runt_datagram_rejected() {
        assert_eq!(decode_datagram(&[1, 2]), None);
    }

    #[test]
    fn test_tcp_frame_layout() {
        let frame = encode_tcp_frame(0x0102, b"abc");
        // len covers id + payload
        assert_eq!(&frame[0..4], &7u32.to_le_bytes());
        assert_eq!(&frame[4..8], &0x0102u32.to_le_bytes());
        assert_eq!(&frame[8..], b"abc");
    }

    #[tokio::test]
    async fn test_read_tcp_frame_roundtrip() {
        let frame = encode_tcp_frame(9, b"payload");
        let mut cursor = std::io::Cursor::new(frame);
        let decoded = read_tcp_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded, Some((9, b"payload".to_vec())));
        // Second read hits clean EOF.
        let eof = read_tcp_frame(&mut cursor).await.unwrap();
        assert_eq!(eof, None);
    }

    #[tokio::test]
    async fn test_read_tcp_frame_rejects_bad_length() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes()); // shorter than the id field
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(read_tcp_frame(&mut cursor).await.is_err());
    }
}
