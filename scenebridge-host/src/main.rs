//! scenebridge host - demo host application
//!
//! Stands in for the 3D application: owns a scene on a dedicated host
//! thread and exposes it through the socket backend.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use scenebridge_host::{scene_registry, spawn_host_thread, BridgeState, Scene, SocketBackend};
use scenebridge_utils::{init_logging_with_config, BridgeError, ConfigLoader, LogConfig, Result};

/// Demo host application serving a scene over the command bridge
#[derive(Parser, Debug)]
#[command(name = "scenebridge-host")]
#[command(about = "Demo host application for the scenebridge command bridge")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the XDG config location)
    #[arg(short, long, env = "SCENEBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the backend on
    #[arg(long, env = "SCENEBRIDGE_BACKEND_HOST")]
    host: Option<String>,

    /// Port to bind the backend on
    #[arg(short, long, env = "SCENEBRIDGE_BACKEND_PORT")]
    port: Option<u16>,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_optional(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.backend.host = host;
    }
    if let Some(port) = cli.port {
        config.backend.port = port;
    }

    let log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::host().with_filter(config.logging.filter.as_deref())
    };
    init_logging_with_config(log_config)?;

    let registry = scene_registry().map_err(|e| BridgeError::internal(e.to_string()))?;
    let (host, host_thread) = spawn_host_thread("scene-host", Scene::new(), registry)?;

    let backend = SocketBackend::start(&config.backend, host).await?;
    info!(addr = %backend.local_addr(), "scenebridge host ready");

    let mut state_rx = backend.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
        }
        _ = state_rx.wait_for(|s| *s == BridgeState::Closed) => {
            info!("Backend closed");
        }
    }

    backend.stop().await;

    // The backend owned the last host handle, so the host thread winds down
    let scene = tokio::task::spawn_blocking(move || host_thread.join())
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?
        .map_err(|_| BridgeError::internal("host thread panicked"))?;

    info!(
        objects = scene.objects().len(),
        layers = scene.layers().len(),
        "scenebridge host stopped"
    );
    Ok(())
}
