//! Helpers shared by unit tests

use tokio::net::TcpListener;

use scenebridge_utils::ClientConfig;

use crate::client::{BridgeClient, BridgeQueue};
use crate::mcp::McpService;

/// Client settings pointing at a port nothing listens on
pub(crate) async fn offline_config() -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs: 1,
        connect_retries: 1,
        retry_delay_ms: 10,
    }
}

/// Service whose bridge calls all fail to connect
pub(crate) async fn offline_service() -> McpService {
    McpService::new(BridgeQueue::new(BridgeClient::new(offline_config().await)))
}
