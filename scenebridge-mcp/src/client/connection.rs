//! Bridge client connection to the socket backend
//!
//! One TCP connection, one command in flight. The protocol carries no
//! request ids, so the client keeps the request/response pairing intact by
//! tearing the connection down whenever a response could be mis-paired:
//! after a timeout, after a decode error, when a frame shows up while
//! no call is pending, and when a previous call was abandoned mid-flight.

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use scenebridge_protocol::{ClientCodec, CodecError, Command, ErrorKind, Params, Response};
use scenebridge_utils::ClientConfig;

/// Connection state as seen by the agent side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected {
        peer: SocketAddr,
        since: Instant,
        last_activity: Instant,
    },
    Reconnecting {
        attempt: u32,
    },
}

impl ClientState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Errors raised while establishing a connection or writing a command
///
/// These never reach the agent directly; [`BridgeClient::call`] folds them
/// into a `ConnectionError` failure.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to {addr} after {attempts} attempt(s): {source}")]
    Connect {
        addr: String,
        attempts: u32,
        source: io::Error,
    },

    #[error("Not connected to the backend")]
    NotConnected,

    #[error("Failed to send command: {0}")]
    Send(#[source] CodecError),
}

/// Agent-side owner of the single backend connection
///
/// `call` takes `&mut self`, so a second call cannot start while one is
/// pending. Front-ends that accept concurrent requests queue them through
/// [`BridgeQueue`](super::BridgeQueue).
pub struct BridgeClient {
    config: ClientConfig,
    framed: Option<Framed<TcpStream, ClientCodec>>,
    state_tx: watch::Sender<ClientState>,
    connections: u64,
    /// Set once a command is written, cleared when its response is taken.
    /// Still set on entry means the caller dropped the future mid-call.
    pending: bool,
}

impl BridgeClient {
    /// Create a client; no connection is made until first use
    pub fn new(config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ClientState::Disconnected);
        Self {
            config,
            framed: None,
            state_tx,
            connections: 0,
            pending: false,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the connection state
    pub fn state(&self) -> ClientState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state_tx.subscribe()
    }

    /// Number of connections established so far
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Connect unless already connected
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.framed.is_some() {
            return Ok(());
        }

        let (stream, peer) = self.connect_with_retry().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        self.framed = Some(Framed::new(stream, ClientCodec::new()));
        self.connections += 1;
        let now = Instant::now();
        self.set_state(ClientState::Connected {
            peer,
            since: now,
            last_activity: now,
        });
        info!(%peer, connection = self.connections, "Connected to backend");
        Ok(())
    }

    /// Close the connection; the next call reconnects
    pub fn disconnect(&mut self) {
        self.drop_connection("disconnect requested");
    }

    /// Send one command and wait up to `timeout` for its response
    ///
    /// Never fails at the language level: every problem comes back as a
    /// structured failure. A timeout abandons the wait only; the command
    /// keeps running on the host and its late response is thrown away with
    /// the connection.
    pub async fn call(&mut self, name: &str, params: Params, timeout: Duration) -> Response {
        let command = Command::new(name, params);
        let started = Instant::now();

        if let Err(e) = self.send_command(&command).await {
            warn!(command = name, error = %e, "Command could not be sent");
            return Response::failure(ErrorKind::ConnectionError, e.to_string());
        }
        debug!(command = name, "Command sent, awaiting response");

        let Some(framed) = self.framed.as_mut() else {
            return Response::failure(ErrorKind::ConnectionError, "Not connected to the backend");
        };
        let outcome = tokio::time::timeout(timeout, framed.next()).await;
        self.pending = false;

        let response = match outcome {
            Ok(Some(Ok(response))) => {
                if response.kind().is_some_and(|k| k.poisons_connection()) {
                    self.drop_connection("backend reported a connection fault");
                } else {
                    self.touch();
                }
                response
            }
            Ok(Some(Err(e))) => {
                let kind = if e.is_decode_error() {
                    ErrorKind::DecodeError
                } else {
                    ErrorKind::ConnectionError
                };
                self.drop_connection("response could not be read");
                Response::failure(kind, format!("Failed to read response to '{}': {}", name, e))
            }
            Ok(None) => {
                self.drop_connection("closed by backend mid-call");
                Response::failure(
                    ErrorKind::ConnectionError,
                    format!("Backend closed the connection before responding to '{}'", name),
                )
            }
            Err(_) => {
                warn!(
                    command = name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for response"
                );
                self.drop_connection("call timed out");
                Response::failure(
                    ErrorKind::Timeout,
                    format!("No response to '{}' within {:.1}s", name, timeout.as_secs_f64()),
                )
            }
        };

        debug!(
            command = name,
            ok = response.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Call finished"
        );
        response
    }

    /// [`call`](Self::call) with the configured timeout
    pub async fn call_default(&mut self, name: &str, params: Params) -> Response {
        let timeout = self.config.timeout();
        self.call(name, params, timeout).await
    }

    /// Write a command, reconnecting and retrying once if the write fails
    ///
    /// Only failures before the command reached the socket are retried.
    async fn send_command(&mut self, command: &Command) -> Result<(), ClientError> {
        match self.write_once(command.clone()).await {
            Ok(()) => Ok(()),
            Err(e @ ClientError::Connect { .. }) => Err(e),
            Err(e) => {
                warn!(command = %command.name, error = %e, "Write failed, reconnecting to retry once");
                self.write_once(command.clone()).await
            }
        }
    }

    async fn write_once(&mut self, command: Command) -> Result<(), ClientError> {
        self.discard_abandoned();
        self.discard_stale();
        self.connect().await?;

        let framed = self.framed.as_mut().ok_or(ClientError::NotConnected)?;
        self.pending = true;
        let result = framed.send(command).await;
        if let Err(e) = result {
            self.drop_connection("write failed");
            return Err(ClientError::Send(e));
        }
        Ok(())
    }

    /// Drop a connection whose last command never had its response read
    ///
    /// Happens when the future returned by [`call`](Self::call) is dropped
    /// after the write. The owed response may not have arrived yet, so
    /// draining is not enough.
    fn discard_abandoned(&mut self) {
        if !self.pending {
            return;
        }
        warn!(
            kind = %ErrorKind::StaleResponse,
            "Previous call was abandoned with its response outstanding"
        );
        self.drop_connection("abandoned call");
    }

    /// Check the idle connection for frames nobody asked for
    ///
    /// Anything readable here is either a stale response, an error or EOF.
    /// All three leave the connection unfit for the next call.
    fn discard_stale(&mut self) {
        let Some(framed) = self.framed.as_mut() else {
            return;
        };

        let reason = match framed.next().now_or_never() {
            None => return,
            Some(Some(Ok(response))) => {
                warn!(
                    kind = %ErrorKind::StaleResponse,
                    response = ?response,
                    "Discarding response received with no call pending"
                );
                "stale response"
            }
            Some(Some(Err(e))) => {
                warn!(error = %e, "Connection failed while idle");
                "idle read failed"
            }
            Some(None) => {
                info!("Backend closed the connection");
                "closed by backend"
            }
        };
        self.drop_connection(reason);
    }

    async fn connect_with_retry(&self) -> Result<(TcpStream, SocketAddr), ClientError> {
        let addr = self.config.address();
        let retries = self.config.connect_retries.max(1);
        let delay = self.config.retry_delay();
        let mut last_error = None;

        for attempt in 1..=retries {
            if attempt > 1 || self.connections > 0 {
                self.set_state(ClientState::Reconnecting { attempt });
            }

            let result = TcpStream::connect(&addr).await.and_then(|stream| {
                let peer = stream.peer_addr()?;
                Ok((stream, peer))
            });
            match result {
                Ok(connected) => return Ok(connected),
                Err(e) => {
                    warn!(
                        addr = %addr,
                        attempt,
                        retries,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < retries {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.set_state(ClientState::Disconnected);
        Err(ClientError::Connect {
            addr,
            attempts: retries,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no connection attempt made")),
        })
    }

    fn drop_connection(&mut self, reason: &str) {
        self.pending = false;
        if self.framed.take().is_some() {
            info!(reason, "Dropped backend connection");
        }
        self.set_state(ClientState::Disconnected);
    }

    fn touch(&self) {
        self.state_tx.send_modify(|state| {
            if let ClientState::Connected { last_activity, .. } = state {
                *last_activity = Instant::now();
            }
        });
    }

    fn set_state(&self, state: ClientState) {
        self.state_tx.send_replace(state);
    }
}
