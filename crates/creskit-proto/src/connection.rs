//! Persistent TCP link to the controller with auto-reconnect.
//!
//! One background task owns the socket for its whole life: it connects,
//! decodes inbound bytes into [`Frame`]s, writes outbound wire text, and
//! reconnects when the peer goes away. Because the slot is owned by a
//! single task there is never more than one connect attempt in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use creskit_proto::{ConnectionHandle, FrameSink, PeerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let (link, mut inbound) = ConnectionHandle::spawn(PeerConfig::new("192.168.1.50", 41794), cancel.clone());
//!
//! link.send("Lightbulb:5:getPowerState:*");
//! while let Some(frame) = inbound.recv().await {
//!     println!("{frame}");
//! }
//!
//! link.shutdown();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::codec::FrameCodec;
use crate::error::Error;
use crate::frame::Frame;

// ── Channel capacities ───────────────────────────────────────────────

const INBOUND_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

// ── PeerConfig ───────────────────────────────────────────────────────

/// Where the controller listens and how hard to try reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub host: String,
    pub port: u16,

    /// Pause after a failed connect attempt. Default: 1s.
    ///
    /// A connection the peer closes is re-opened immediately; this only
    /// applies when the connect itself fails.
    pub retry_delay: Duration,

    /// Upper bound on a single connect attempt. Default: 10s.
    pub connect_timeout: Duration,

    /// Consecutive failed connects before giving up.
    /// `None` means retry forever.
    pub max_attempts: Option<u32>,
}

impl PeerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            retry_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            max_attempts: None,
        }
    }

    /// `host:port`, for logging and error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidPeer("host is empty".into()));
        }
        if self.port == 0 {
            return Err(Error::InvalidPeer(format!("{}: port 0", self.host)));
        }
        Ok(())
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Link state observable through [`ConnectionHandle::watch_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── FrameSink ────────────────────────────────────────────────────────

/// Anything that can put encoded wire text onto the link.
///
/// Sends are best effort: when the link is down the text is dropped and
/// `false` is returned. Nothing is queued for a later connection.
pub trait FrameSink: Send + Sync {
    fn send(&self, wire: &str) -> bool;
}

// ── ConnectionHandle ─────────────────────────────────────────────────

/// Handle to the running connection task.
///
/// Cheaply cloneable. Call [`shutdown`](Self::shutdown) (or cancel the
/// token passed to [`spawn`](Self::spawn)) to tear the task down.
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound_tx: mpsc::Sender<String>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Spawn the connection loop.
    ///
    /// Returns immediately; the first connect happens in the background.
    /// Inbound frames arrive on the returned receiver in wire order.
    pub fn spawn(peer: PeerConfig, cancel: CancellationToken) -> (Self, mpsc::Receiver<Frame>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            link_loop(peer, inbound_tx, outbound_rx, state_tx, task_cancel).await;
        });

        let handle = Self {
            outbound_tx,
            state: state_rx,
            cancel,
        };
        (handle, inbound_rx)
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to link state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait until the background task has exited.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        while state.changed().await.is_ok() {}
    }
}

impl FrameSink for ConnectionHandle {
    fn send(&self, wire: &str) -> bool {
        if self.state() != ConnectionState::Connected {
            tracing::debug!(wire, "link down, dropping frame");
            return false;
        }

        match self.outbound_tx.try_send(wire.to_owned()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(wire, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

// ── Background connection loop ───────────────────────────────────────

/// Why a connected session stopped.
enum SessionEnd {
    /// Peer closed the socket.
    Closed,
    /// Shutdown was requested.
    Cancelled,
    /// Nobody is left on the other side of the frame channels.
    Abandoned,
}

/// Main loop: connect → session → on close, reconnect.
async fn link_loop(
    peer: PeerConfig,
    inbound_tx: mpsc::Sender<Frame>,
    mut outbound_rx: mpsc::Receiver<String>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let addr = peer.addr();
    let mut failures: u32 = 0;

    loop {
        // Frames accepted during the previous session but never written
        // belong to that session.
        while outbound_rx.try_recv().is_ok() {}

        state_tx.send_replace(ConnectionState::Connecting);

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = open(&peer) => result,
        };

        match connected {
            Ok(stream) => {
                failures = 0;
                state_tx.send_replace(ConnectionState::Connected);
                tracing::info!(addr = %addr, "connected to controller");

                let ended = run_session(stream, &inbound_tx, &mut outbound_rx, &cancel).await;
                state_tx.send_replace(ConnectionState::Disconnected);

                match ended {
                    Ok(SessionEnd::Closed) => {
                        tracing::info!(addr = %addr, "connection closed, reconnecting");
                    }
                    Ok(SessionEnd::Cancelled | SessionEnd::Abandoned) => break,
                    Err(e) => {
                        tracing::warn!(addr = %addr, error = %e, "connection lost, reconnecting");
                    }
                }
            }
            Err(e) => {
                state_tx.send_replace(ConnectionState::Disconnected);
                failures = failures.saturating_add(1);
                tracing::warn!(error = %e, attempt = failures, "connect failed");

                if let Some(max) = peer.max_attempts {
                    if failures >= max {
                        tracing::error!(max_attempts = max, "connect limit reached, giving up");
                        break;
                    }
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(peer.retry_delay) => {}
                }
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    tracing::debug!(addr = %addr, "link loop exiting");
}

/// Open one TCP connection, bounded by the connect timeout.
async fn open(peer: &PeerConfig) -> Result<TcpStream, Error> {
    let addr = peer.addr();
    tracing::debug!(addr = %addr, "connecting");

    match tokio::time::timeout(
        peer.connect_timeout,
        TcpStream::connect((peer.host.as_str(), peer.port)),
    )
    .await
    {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::trace!(error = %e, "could not set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(Error::Connect {
            addr,
            reason: e.to_string(),
        }),
        Err(_) => Err(Error::ConnectTimeout {
            addr,
            timeout_secs: peer.connect_timeout.as_secs(),
        }),
    }
}

// ── Single session ───────────────────────────────────────────────────

/// Pump frames both ways until the socket drops or shutdown is requested.
async fn run_session(
    stream: TcpStream,
    inbound_tx: &mpsc::Sender<Frame>,
    outbound_rx: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, Error> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Frames already accepted still go out before the close.
                while let Ok(wire) = outbound_rx.try_recv() {
                    framed.feed(wire).await?;
                }
                framed.flush().await?;
                return Ok(SessionEnd::Cancelled);
            }
            item = framed.next() => match item {
                Some(Ok(frame)) => {
                    tracing::trace!(frame = %frame, "rx");
                    if inbound_tx.send(frame).await.is_err() {
                        return Ok(SessionEnd::Abandoned);
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(SessionEnd::Closed),
            },
            wire = outbound_rx.recv() => match wire {
                Some(wire) => {
                    tracing::trace!(wire = %wire, "tx");
                    framed.send(wire).await?;
                }
                None => return Ok(SessionEnd::Abandoned),
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
