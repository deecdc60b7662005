//! MCP (Model Context Protocol) front-ends
//!
//! The JSON-RPC service is shared; `stdio` and `sse` only move bytes.

pub mod error;
pub mod prompts;
pub mod protocol;
pub mod service;
pub mod sse;
pub mod stdio;
pub mod tools;

pub use error::McpError;
pub use service::{tool_result, McpService};
pub use sse::SseTransport;
pub use stdio::{run_stdio, serve_lines};
pub use tools::{ToolCatalog, ToolSpec};
