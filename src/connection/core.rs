//! One multiplexed connection: a single task owns the socket and
//! serializes writes against an in-flight FIFO queue, correlating
//! decoded reply frames back to their caller and demultiplexing push
//! frames to a separate channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{info_span, warn, Instrument};

use crate::codec::{decode, Decoded, Frame, PushFrame, Value};
use crate::config::{AuthConfig, ProtocolVersion, TlsMode};
use crate::error::{CoreError, Result};

use super::handshake;
use super::state::ConnectionState;
use super::transport::{self, Transport};

enum Cmd {
    Send(BytesMut, oneshot::Sender<Result<Value>>),
    Close,
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Owns one socket. Cheap to clone: clones share the same background
/// task and in-flight queue.
#[derive(Clone)]
pub struct Connection {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    state: Arc<RwLock<ConnectionState>>,
    holds_blocking: Arc<AtomicBool>,
    id: u64,
}

impl Connection {
    /// Opens a TCP (or TLS) connection to `host:port` and drives the
    /// handshake; the returned connection is `Healthy` or this fails
    /// with `HandshakeError`/`Io`.
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        host: &str,
        port: u16,
        tls_mode: TlsMode,
        protocol: ProtocolVersion,
        auth: &Option<AuthConfig>,
        client_name: &Option<String>,
        database_id: u32,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PushFrame>)> {
        let mut sock = transport::connect(host, port, tls_mode).await?;
        handshake::perform(&mut sock, protocol, auth, client_name, database_id).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(ConnectionState::Healthy));
        let holds_blocking = Arc::new(AtomicBool::new(false));
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

        let span = info_span!("connection", id, endpoint = %format!("{host}:{port}"));
        tokio::spawn(run(sock, cmd_rx, push_tx, state.clone()).instrument(span));

        Ok((
            Connection {
                cmd_tx,
                state,
                holds_blocking,
                id,
            },
            push_rx,
        ))
    }

    /// Process-global, monotonically increasing identity used purely
    /// for log correlation across retries/redirects.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Enqueues `frame`, returning the eventual decoded reply. Fails
    /// immediately with `ConnectionClosed` if the background task has
    /// already torn down.
    pub async fn send(&self, frame: BytesMut) -> Result<Value> {
        if !self.state().is_usable() {
            return Err(CoreError::ConnectionClosed(
                "connection not healthy".into(),
            ));
        }
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Send(frame, tx))
            .map_err(|_| CoreError::ConnectionClosed("connection task gone".into()))?;
        rx.await
            .map_err(|_| CoreError::ConnectionClosed("connection task dropped response".into()))?
    }

    pub fn close(&self) {
        let _ = self.cmd_tx.send(Cmd::Close);
        *self.state.write() = ConnectionState::Closed;
    }

    /// Marks whether this connection currently holds a blocking
    /// command (`BLPOP`, `XREAD BLOCK`, `SUBSCRIBE`, ...), used by the
    /// pool's dispatch reservation heuristic.
    pub fn set_holds_blocking(&self, value: bool) {
        self.holds_blocking.store(value, Ordering::Relaxed);
    }

    pub fn holds_blocking(&self) -> bool {
        self.holds_blocking.load(Ordering::Relaxed)
    }
}

async fn run(
    mut sock: Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    push_tx: mpsc::UnboundedSender<PushFrame>,
    state: Arc<RwLock<ConnectionState>>,
) {
    let mut in_flight: VecDeque<oneshot::Sender<Result<Value>>> = VecDeque::new();
    let mut read_buf = Vec::with_capacity(4096);
    let mut read_chunk = [0u8; 4096];

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Cmd::Send(frame, responder)) => {
                        let write_result = async {
                            sock.write_all(&frame).await?;
                            sock.flush().await
                        }
                        .await;
                        if write_result.is_err() {
                            fail_all(&mut in_flight, "write failed");
                            *state.write() = ConnectionState::Broken;
                            let _ = responder.send(Err(CoreError::ConnectionClosed("write failed".into())));
                            return;
                        }
                        in_flight.push_back(responder);
                    }
                    Some(Cmd::Close) | None => {
                        fail_all(&mut in_flight, "connection closed");
                        *state.write() = ConnectionState::Closed;
                        return;
                    }
                }
            }
            n = sock.read(&mut read_chunk) => {
                match n {
                    Ok(0) => {
                        warn!("server closed connection");
                        fail_all(&mut in_flight, "server closed connection");
                        *state.write() = ConnectionState::Broken;
                        return;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&read_chunk[..n]);
                        if let Err(e) = drain_frames(&mut read_buf, &mut in_flight, &push_tx) {
                            warn!(error = %e, "protocol error, tearing down connection");
                            fail_all(&mut in_flight, "protocol error");
                            *state.write() = ConnectionState::Broken;
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "read failed");
                        fail_all(&mut in_flight, "read failed");
                        *state.write() = ConnectionState::Broken;
                        return;
                    }
                }
            }
        }
    }
}

fn drain_frames(
    buf: &mut Vec<u8>,
    in_flight: &mut VecDeque<oneshot::Sender<Result<Value>>>,
    push_tx: &mpsc::UnboundedSender<PushFrame>,
) -> Result<()> {
    loop {
        match decode(buf)? {
            Decoded::Incomplete => return Ok(()),
            Decoded::Complete { frame, consumed } => {
                buf.drain(..consumed);
                match frame {
                    Frame::Push(p) => {
                        let _ = push_tx.send(p);
                    }
                    Frame::Reply(v) => {
                        if let Some(responder) = in_flight.pop_front() {
                            let _ = responder.send(Ok(v));
                        }
                    }
                }
            }
        }
    }
}

fn fail_all(in_flight: &mut VecDeque<oneshot::Sender<Result<Value>>>, reason: &str) {
    while let Some(responder) = in_flight.pop_front() {
        let _ = responder.send(Err(CoreError::ConnectionClosed(reason.to_string())));
    }
}
