//! Agent-side half of the command bridge
//!
//! [`BridgeClient`] owns the one connection to the socket backend;
//! [`BridgeQueue`] lets many concurrent requesters share it in FIFO order.

mod connection;
mod queue;

pub use connection::{BridgeClient, ClientError, ClientState};
pub use queue::BridgeQueue;
