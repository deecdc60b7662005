//! Socket backend
//!
//! Owns the listening socket inside the host application. One client
//! connection is served at a time; every decoded command is handed to the
//! host thread and its response written back before the next frame is read.
//!
//! Accept policy: a newly accepted connection supersedes the active one. The
//! previous connection task is aborted and awaited (dropping its socket)
//! before the new one starts. A client that lost its socket without the host
//! noticing can always reconnect this way.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use scenebridge_protocol::{CodecError, ErrorKind, HostCodec, Response};
use scenebridge_utils::{BackendConfig, BridgeError};

use crate::executor::HostHandle;
use crate::state::BridgeState;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Backend startup errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BackendError> for BridgeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Bind { addr, source } => BridgeError::Bind { addr, source },
            BackendError::Io(e) => BridgeError::Io(e),
        }
    }
}

/// State shared between the accept loop, the connection task and the handle
struct Shared {
    state: RwLock<BridgeState>,
    state_tx: watch::Sender<BridgeState>,
    shutdown_tx: watch::Sender<bool>,
    local_addr: SocketAddr,
}

impl Shared {
    fn set_state(&self, state: BridgeState) {
        debug!(state = %state, "Backend state");
        *self.state.write() = state.clone();
        self.state_tx.send_replace(state);
    }

    fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Entry point for starting the backend
pub struct SocketBackend;

impl SocketBackend {
    /// Bind the configured address and start accepting
    ///
    /// Must be called from within a tokio runtime. Started by the host
    /// application, never by the agent side.
    pub async fn start(config: &BackendConfig, host: HostHandle) -> Result<BackendHandle, BackendError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| BackendError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (state_tx, _) = watch::channel(BridgeState::Idle);
        let (shutdown_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: RwLock::new(BridgeState::Idle),
            state_tx,
            shutdown_tx,
            local_addr,
        });
        shared.set_state(BridgeState::Listening { addr: local_addr });

        info!(addr = %local_addr, "Socket backend listening");

        let task = tokio::spawn(accept_loop(listener, host, Arc::clone(&shared)));

        Ok(BackendHandle { shared, task })
    }
}

/// Handle to a running backend
pub struct BackendHandle {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl BackendHandle {
    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Snapshot of the current state
    pub fn state(&self) -> BridgeState {
        self.shared.state.read().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.shared.state_tx.subscribe()
    }

    /// Whether the accept loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop accepting, close the active connection and wait for shutdown
    pub async fn stop(self) {
        self.shared.request_shutdown();
        if let Err(e) = self.task.await {
            error!("Backend task failed: {}", e);
        }
    }

    /// Wait until the backend stops by itself (e.g. the host went away)
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            error!("Backend task failed: {}", e);
        }
    }
}

async fn accept_loop(listener: TcpListener, host: HostHandle, shared: Arc<Shared>) {
    let mut shutdown_rx = shared.shutdown_tx.subscribe();
    let mut current: Option<JoinHandle<()>> = None;

    loop {
        if *shutdown_rx.borrow_and_update() {
            break;
        }

        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        if let Some(previous) = current.take() {
                            if !previous.is_finished() {
                                info!(peer = %peer, "New client supersedes active connection");
                            }
                            previous.abort();
                            let _ = previous.await;
                        }

                        info!(peer = %peer, "Client connected");
                        shared.set_state(BridgeState::connected(peer));
                        current = Some(tokio::spawn(serve_connection(
                            stream,
                            peer,
                            host.clone(),
                            Arc::clone(&shared),
                        )));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(previous) = current.take() {
        previous.abort();
        let _ = previous.await;
    }

    drop(listener);
    shared.set_state(BridgeState::Closed);
    info!("Socket backend stopped");
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, host: HostHandle, shared: Arc<Shared>) {
    let mut framed = Framed::new(stream, HostCodec::new());
    let since = Instant::now();

    loop {
        let command = match framed.next().await {
            Some(Ok(command)) => command,
            Some(Err(e)) if e.is_decode_error() => {
                warn!(peer = %peer, error = %e, "Malformed frame, closing connection");
                // Best effort; the peer may already be gone
                let _ = framed
                    .send(Response::failure(ErrorKind::DecodeError, e.to_string()))
                    .await;
                break;
            }
            Some(Err(e)) => {
                warn!(peer = %peer, error = %e, "Connection read failed");
                break;
            }
            None => {
                info!(peer = %peer, "Client disconnected");
                break;
            }
        };

        let name = command.name.clone();
        let started = Instant::now();
        shared.set_state(BridgeState::Executing {
            peer,
            command: name.clone(),
            since: started,
        });

        let response = match host.submit(command).await {
            Ok(response) => response,
            Err(gone) => {
                error!(peer = %peer, command = %name, "{}", gone);
                let _ = framed
                    .send(Response::failure(
                        ErrorKind::ConnectionError,
                        "Host application is no longer executing commands",
                    ))
                    .await;
                shared.request_shutdown();
                return;
            }
        };

        debug!(
            peer = %peer,
            command = %name,
            ok = response.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command executed"
        );

        if let Err(e) = write_response(&mut framed, response).await {
            warn!(peer = %peer, command = %name, error = %e, "Failed to write response");
            break;
        }

        shared.set_state(BridgeState::Connected {
            peer,
            since,
            last_activity: Instant::now(),
        });
    }

    shared.set_state(BridgeState::Listening {
        addr: shared.local_addr,
    });
}

/// Write a response, replacing one that cannot be framed
///
/// An oversized or unserializable result is the handler's fault: the
/// encoder rejects it before touching the write buffer, so a
/// `HandlerError` goes out in its place and the connection stays usable.
/// Only I/O errors are returned.
async fn write_response(
    framed: &mut Framed<TcpStream, HostCodec>,
    response: Response,
) -> Result<(), CodecError> {
    match framed.send(response).await {
        Err(e) if e.is_decode_error() => {
            warn!(error = %e, "Handler result could not be encoded");
            framed
                .send(Response::failure(
                    ErrorKind::HandlerError,
                    format!("Handler result could not be sent: {}", e),
                ))
                .await
        }
        other => other,
    }
}
