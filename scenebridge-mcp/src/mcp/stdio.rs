//! stdio transport
//!
//! Newline-delimited JSON-RPC on stdin/stdout. stdout belongs to the
//! protocol, so nothing else may print there.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use super::error::McpError;
use super::service::McpService;

/// Serve the process's stdin/stdout until stdin closes
pub async fn run_stdio(service: &McpService) -> Result<(), McpError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(service, stdin, stdout).await
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer`
///
/// Requests are handled one at a time in arrival order. Returns on EOF or
/// the first I/O error.
pub async fn serve_lines<R, W>(service: &McpService, reader: R, mut writer: W) -> Result<(), McpError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("MCP stdio transport starting");
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = service.handle_message(line).await {
            let mut json = serde_json::to_string(&response)?;
            json.push('\n');
            writer.write_all(json.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    info!("stdin closed, MCP stdio transport shutting down");
    Ok(())
}
