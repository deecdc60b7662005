//! FIFO access to the single bridge client

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::trace;

use scenebridge_protocol::{Params, Response};

use super::connection::{BridgeClient, ClientState};

/// Shared handle serializing calls onto one [`BridgeClient`]
///
/// Waiters are served in arrival order because the tokio mutex is fair, so
/// two agent requests can never interleave on the connection.
#[derive(Clone)]
pub struct BridgeQueue {
    client: Arc<Mutex<BridgeClient>>,
    state_rx: watch::Receiver<ClientState>,
    timeout: Duration,
}

impl BridgeQueue {
    pub fn new(client: BridgeClient) -> Self {
        let state_rx = client.subscribe();
        let timeout = client.config().timeout();
        Self {
            client: Arc::new(Mutex::new(client)),
            state_rx,
            timeout,
        }
    }

    /// Per-call timeout applied by [`call`](Self::call)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for our turn, then run one call with the configured timeout
    pub async fn call(&self, name: &str, params: Params) -> Response {
        self.call_with_timeout(name, params, self.timeout).await
    }

    pub async fn call_with_timeout(&self, name: &str, params: Params, timeout: Duration) -> Response {
        trace!(command = name, "Waiting for bridge");
        let mut client = self.client.lock().await;
        client.call(name, params, timeout).await
    }

    /// Connection state without waiting for the queue
    pub fn state(&self) -> ClientState {
        self.state_rx.borrow().clone()
    }

    pub async fn disconnect(&self) {
        self.client.lock().await.disconnect();
    }
}
