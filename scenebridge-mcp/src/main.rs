//! scenebridge-mcp - MCP front-end
//!
//! Exposes the host application's commands to an agent over stdio or
//! HTTP+SSE, forwarding each tool call through the single bridge client.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use scenebridge_mcp::mcp::run_stdio;
use scenebridge_mcp::{BridgeClient, BridgeQueue, Cli, McpService, SseTransport, Transport};
use scenebridge_utils::{init_logging_with_config, ConfigLoader, LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_optional(cli.config.as_deref())?;
    cli.apply(&mut config);
    ConfigLoader::validate(&config)?;

    let filter = config.logging.filter.as_deref();
    let log_config = match (cli.verbose, cli.transport) {
        (true, _) => LogConfig::development(),
        (false, Transport::Stdio) => LogConfig::mcp_stdio().with_filter(filter),
        (false, Transport::Sse) => LogConfig::mcp_sse().with_filter(filter),
    };
    init_logging_with_config(log_config)?;

    info!(
        transport = ?cli.transport,
        backend = %config.client.address(),
        "scenebridge-mcp starting"
    );

    // Connection is made lazily on the first tool call, so the front-end
    // comes up even while the host application is not running yet
    let bridge = BridgeQueue::new(BridgeClient::new(config.client.clone()));
    let service = Arc::new(McpService::new(bridge));

    match cli.transport {
        Transport::Stdio => {
            if let Err(e) = run_stdio(&service).await {
                error!("stdio transport failed: {}", e);
                return Err(e.into());
            }
        }
        Transport::Sse => {
            let transport = SseTransport::bind(&config.sse, Arc::clone(&service)).await?;
            tokio::select! {
                result = transport.run() => result?,
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for ctrl-c: {}", e);
                    }
                    info!("Shutdown requested");
                }
            }
        }
    }

    service.bridge().disconnect().await;
    info!("scenebridge-mcp stopped");
    Ok(())
}
