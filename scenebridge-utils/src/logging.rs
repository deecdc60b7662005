//! Logging infrastructure for scenebridge
//!
//! Provides unified logging setup using the tracing ecosystem.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, BridgeError, Result};

/// Environment variable holding the global log filter
pub const LOG_ENV: &str = "SCENEBRIDGE_LOG";

/// Environment variable holding the MCP-specific log filter
pub const MCP_LOG_ENV: &str = "SCENEBRIDGE_MCP_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "scenebridge_host=debug,hyper=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Optional custom log file name (defaults to "scenebridge.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }
}

/// Pick the first filter that is set, falling back to `default`
fn resolve_filter(primary: Option<String>, secondary: Option<String>, default: &str) -> String {
    primary
        .or(secondary)
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl LogConfig {
    /// Config for the host backend (stderr and file; the host owns no protocol stream)
    pub fn host() -> Self {
        Self {
            output: LogOutput::Both,
            filter: resolve_filter(std::env::var(LOG_ENV).ok(), None, "info"),
            span_events: false,
            file_line: true,
            file_name: Some("host.log".into()),
        }
    }

    /// Config for the stdio MCP front-end (file only, stdout carries the protocol)
    pub fn mcp_stdio() -> Self {
        Self {
            output: LogOutput::File,
            filter: resolve_filter(
                std::env::var(MCP_LOG_ENV).ok(),
                std::env::var(LOG_ENV).ok(),
                "info",
            ),
            span_events: false,
            file_line: true,
            file_name: Some("mcp-stdio.log".into()),
        }
    }

    /// Config for the SSE MCP front-end
    pub fn mcp_sse() -> Self {
        Self {
            output: LogOutput::Both,
            filter: resolve_filter(
                std::env::var(MCP_LOG_ENV).ok(),
                std::env::var(LOG_ENV).ok(),
                "info",
            ),
            span_events: false,
            file_line: true,
            file_name: Some("mcp-sse.log".into()),
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }

    /// Replace the filter when the configuration file sets one
    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.filter = filter.to_string();
        }
        self
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| BridgeError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
    } else {
        fmt_layer
    };

    let fmt_layer = fmt_layer
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let file_name = config.file_name.as_deref().unwrap_or("scenebridge.log");

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| BridgeError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let file = open_log_file(file_name)?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| BridgeError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::Both => {
            let file = open_log_file(file_name)?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .map_err(|e| BridgeError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

fn open_log_file(file_name: &str) -> Result<std::fs::File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| BridgeError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = log_dir.join(file_name);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| BridgeError::FileWrite {
            path: log_path,
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.filter, "info");
        assert!(!config.span_events);
        assert!(!config.file_line);
    }

    #[test]
    fn test_mcp_stdio_never_writes_stderr_or_stdout() {
        let config = LogConfig::mcp_stdio();
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.file_name, Some("mcp-stdio.log".into()));
    }

    #[test]
    fn test_host_logs_to_both() {
        let config = LogConfig::host();
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(config.file_name, Some("host.log".into()));
    }

    #[test]
    fn test_mcp_sse_file_name() {
        let config = LogConfig::mcp_sse();
        assert_eq!(config.file_name, Some("mcp-sse.log".into()));
    }

    #[test]
    fn test_development_is_verbose() {
        let dev = LogConfig::development();
        assert_eq!(dev.filter, "debug");
        assert!(dev.span_events);
        assert!(dev.file_line);
    }

    #[test]
    fn test_resolve_filter_precedence() {
        assert_eq!(
            resolve_filter(Some("trace".into()), Some("warn".into()), "info"),
            "trace"
        );
        assert_eq!(resolve_filter(None, Some("warn".into()), "info"), "warn");
        assert_eq!(resolve_filter(None, None, "info"), "info");
    }

    #[test]
    fn test_resolve_filter_ignores_blank() {
        assert_eq!(resolve_filter(Some("  ".into()), None, "info"), "info");
    }

    #[test]
    fn test_with_filter_override() {
        let config = LogConfig::default().with_filter(Some("scenebridge_host=debug"));
        assert_eq!(config.filter, "scenebridge_host=debug");

        let config = LogConfig::default().with_filter(None);
        assert_eq!(config.filter, "info");

        let config = LogConfig::default().with_filter(Some(""));
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LogConfig {
            filter: "scenebridge=notalevel".into(),
            ..LogConfig::default()
        };
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    // init_logging() itself is not exercised here: a tracing subscriber can
    // only be installed once per process and tests share the process.
}
