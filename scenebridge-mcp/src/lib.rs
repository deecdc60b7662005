//! scenebridge-mcp: agent-facing side of the command bridge
//!
//! This crate provides:
//! - The bridge client that owns the single backend connection ([`client`])
//! - The MCP JSON-RPC service, tool catalog and prompts ([`mcp`])
//! - The stdio and HTTP+SSE transports ([`mcp::stdio`], [`mcp::sse`])
//! - Command-line handling for the `scenebridge-mcp` binary ([`cli`])

pub mod cli;
pub mod client;
pub mod mcp;

#[cfg(test)]
mod test_support;

pub use cli::{Cli, Transport};
pub use client::{BridgeClient, BridgeQueue, ClientError, ClientState};
pub use mcp::{McpError, McpService, SseTransport, ToolCatalog};
