//! Command-line argument parsing for the MCP front-end
//!
//! Flags override values loaded from the configuration file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use scenebridge_utils::BridgeConfig;

/// Transport the agent talks over
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// HTTP with a server-sent event stream
    Sse,
}

/// scenebridge-mcp - MCP front-end for the scenebridge command bridge
#[derive(Parser, Debug)]
#[command(name = "scenebridge-mcp", author, version, about, long_about = None)]
pub struct Cli {
    /// Transport to serve
    #[arg(long, short = 't', value_enum, default_value_t = Transport::Stdio, env = "SCENEBRIDGE_TRANSPORT")]
    pub transport: Transport,

    /// Configuration file (defaults to the XDG config location)
    #[arg(long, short = 'c', env = "SCENEBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend host to connect to
    #[arg(long, env = "SCENEBRIDGE_BACKEND_HOST")]
    pub backend_host: Option<String>,

    /// Backend port to connect to
    #[arg(long, env = "SCENEBRIDGE_BACKEND_PORT")]
    pub backend_port: Option<u16>,

    /// Per-call timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Address the SSE transport binds
    #[arg(long)]
    pub sse_host: Option<String>,

    /// Port the SSE transport binds
    #[arg(long)]
    pub sse_port: Option<u16>,

    /// Verbose logging to stderr
    ///
    /// stdout is never used for logs, so this is safe with the stdio transport.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Apply flag overrides on top of loaded configuration
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.backend_host {
            config.client.host = host.clone();
        }
        if let Some(port) = self.backend_port {
            config.client.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.client.timeout_secs = timeout;
        }
        if let Some(host) = &self.sse_host {
            config.sse.host = host.clone();
        }
        if let Some(port) = self.sse_port {
            config.sse.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["scenebridge-mcp"]);
        assert_eq!(cli.transport, Transport::Stdio);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);

        let mut config = BridgeConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_sse_transport() {
        let cli = Cli::parse_from(["scenebridge-mcp", "--transport", "sse", "--sse-port", "8080"]);
        assert_eq!(cli.transport, Transport::Sse);

        let mut config = BridgeConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.sse.port, 8080);
        assert_eq!(config.sse.host, "127.0.0.1");
    }

    #[test]
    fn test_backend_overrides() {
        let cli = Cli::parse_from([
            "scenebridge-mcp",
            "--backend-host",
            "10.0.0.2",
            "--backend-port",
            "9999",
            "--timeout",
            "5",
        ]);

        let mut config = BridgeConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.client.host, "10.0.0.2");
        assert_eq!(config.client.port, 9999);
        assert_eq!(config.client.timeout_secs, 5);
        // Backend bind settings belong to the host and stay untouched
        assert_eq!(config.backend, BridgeConfig::default().backend);
    }

    #[test]
    fn test_invalid_transport_rejected() {
        assert!(Cli::try_parse_from(["scenebridge-mcp", "--transport", "websocket"]).is_err());
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["scenebridge-mcp", "-c", "/tmp/bridge.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.toml")));
    }
}
