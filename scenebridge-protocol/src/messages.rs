//! Command and response message types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Loosely-typed command parameters
///
/// Handlers validate the shape they expect; the bridge never does.
pub type Params = serde_json::Map<String, Value>;

/// A single request unit sent from the bridge client to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Name of the registered handler to invoke
    pub name: String,
    /// Handler-specific parameters
    #[serde(default)]
    pub params: Params,
}

impl Command {
    /// Create a command with parameters
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Create a command with an empty parameter map
    pub fn without_params(name: impl Into<String>) -> Self {
        Self::new(name, Params::new())
    }

    /// Build a command from an arbitrary JSON value
    ///
    /// Objects become the parameter map, `null` becomes an empty map, and
    /// anything else is rejected.
    pub fn from_value(name: impl Into<String>, params: Value) -> Option<Self> {
        match params {
            Value::Object(map) => Some(Self::new(name, map)),
            Value::Null => Some(Self::without_params(name)),
            _ => None,
        }
    }
}

/// Classification of every failure the bridge can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No handler is registered under the command name
    UnknownCommand,
    /// The handler faulted while executing
    HandlerError,
    /// A frame could not be parsed; fatal to the connection
    DecodeError,
    /// Connect, accept, read or write failed at the socket level
    ConnectionError,
    /// No response arrived before the caller's deadline
    Timeout,
    /// A response arrived while no call was pending
    StaleResponse,
}

impl ErrorKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCommand => "unknown_command",
            Self::HandlerError => "handler_error",
            Self::DecodeError => "decode_error",
            Self::ConnectionError => "connection_error",
            Self::Timeout => "timeout",
            Self::StaleResponse => "stale_response",
        }
    }

    /// Whether a failure of this kind leaves the connection unusable
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::DecodeError | Self::ConnectionError | Self::Timeout | Self::StaleResponse
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of executing exactly one [`Command`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    /// The handler produced a value
    #[serde(rename = "ok")]
    Success {
        #[serde(default)]
        result: Value,
    },
    /// The command failed; the kind says where
    #[serde(rename = "error")]
    Failure { kind: ErrorKind, message: String },
}

impl Response {
    /// Create a success response
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    /// Create a failure response
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Failure for a command name with no registered handler
    pub fn unknown_command(name: &str) -> Self {
        Self::failure(ErrorKind::UnknownCommand, format!("Unknown command: {}", name))
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error kind, if this is a failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Convert into a standard result
    pub fn into_result(self) -> Result<Value, (ErrorKind, String)> {
        match self {
            Self::Success { result } => Ok(result),
            Self::Failure { kind, message } => Err((kind, message)),
        }
    }
}

/// Top-level wire envelope, tagged by `"type"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Command(Command),
    Response(Response),
}

impl Frame {
    /// Envelope type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Response(_) => "response",
        }
    }
}

impl From<Command> for Frame {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<Response> for Frame {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}
