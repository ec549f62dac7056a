use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ptzlink_core::{Framing, TransportError};
use ptzlink_visca::{framing, ViscaMessage, ViscaReply};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Largest datagram we expect back from the camera.
const RECV_BUF: usize = 64;

// MARK: - ViscaLink trait

/// Outcome of one send that reached the socket.
///
/// A missing reply is not a failure: UDP PTZ control is commonly
/// fire-and-forget, so `TimedOut` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Acked { reply: ViscaReply },
    TimedOut,
}

/// Carries one message at a time to the camera.
///
/// Implementations must serialize `send`: the bytes of two messages, and a
/// message and another message's reply, never overlap.
#[async_trait]
pub trait ViscaLink: Send + Sync {
    /// Send `msg`, then wait up to `timeout` for a reply. A zero timeout
    /// skips the wait and reports [`Delivery::TimedOut`].
    async fn send(&self, msg: &ViscaMessage, timeout: Duration) -> Result<Delivery, TransportError>;

    /// Human-readable peer address for logs and status.
    fn peer(&self) -> String;
}

// MARK: - UdpViscaLink

/// [`ViscaLink`] over a connected UDP socket.
pub struct UdpViscaLink {
    socket: Mutex<UdpSocket>,
    peer: SocketAddr,
    framing: Framing,
    sequence: AtomicU32,
}

impl UdpViscaLink {
    /// Bind an ephemeral local port and connect it to `addr` (`host:port`).
    pub async fn connect(addr: &str, framing: Framing) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TransportError::network(format!("bind: {e}")))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| TransportError::network(format!("connect {addr}: {e}")))?;
        let peer = socket.peer_addr().map_err(TransportError::network)?;

        info!("VISCA link ready → {} ({:?} framing)", peer, framing);
        Ok(Self {
            socket: Mutex::new(socket),
            peer,
            framing,
            sequence: AtomicU32::new(0),
        })
    }

    fn encode(&self, msg: &ViscaMessage) -> (Bytes, Option<u32>) {
        match self.framing {
            Framing::Raw => (msg.to_bytes(), None),
            Framing::ViscaOverIp => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                (framing::wrap(msg, seq), Some(seq))
            }
        }
    }

    /// Strip framing from a received datagram. `None` means "not ours".
    fn reply_payload(&self, datagram: &[u8], expected_seq: Option<u32>) -> Option<Bytes> {
        match self.framing {
            Framing::Raw => Some(Bytes::copy_from_slice(datagram)),
            Framing::ViscaOverIp => {
                let reply = framing::unwrap_reply(datagram)?;
                (Some(reply.sequence) == expected_seq).then_some(reply.payload)
            }
        }
    }
}

/// Throw away replies that belong to earlier commands (completions arrive
/// after acks, late inquiry answers after a timeout).
fn drain_stale(socket: &UdpSocket, buf: &mut [u8]) {
    loop {
        match socket.try_recv(buf) {
            Ok(n) => trace!("Dropped stale reply ({} bytes)", n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            // A pending ICMP error from an earlier send; the next send reports
            // the current state of the path.
            Err(_) => break,
        }
    }
}

#[async_trait]
impl ViscaLink for UdpViscaLink {
    async fn send(&self, msg: &ViscaMessage, timeout: Duration) -> Result<Delivery, TransportError> {
        let socket = self.socket.lock().await;
        let mut buf = [0u8; RECV_BUF];
        drain_stale(&socket, &mut buf);

        let (datagram, seq) = self.encode(msg);
        socket
            .send(&datagram)
            .await
            .map_err(|e| TransportError::network(format!("send to {}: {e}", self.peer)))?;
        debug!("→ {} {}", self.peer, msg);

        if timeout.is_zero() {
            return Ok(Delivery::TimedOut);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let n = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                Err(_) => {
                    debug!("No reply from {} within {:?}", self.peer, timeout);
                    return Ok(Delivery::TimedOut);
                }
                Ok(Err(e)) => {
                    return Err(TransportError::network(format!("recv from {}: {e}", self.peer)))
                }
                Ok(Ok(n)) => n,
            };
            let Some(payload) = self.reply_payload(&buf[..n], seq) else {
                trace!("Ignoring unmatched datagram ({} bytes)", n);
                continue;
            };
            let reply = ViscaReply::classify(&payload);
            debug!("← {} {} ({})", self.peer, ptzlink_visca::hex_string(&payload), reply);
            return Ok(Delivery::Acked { reply });
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}
