//! Command dispatcher and handler registry
//!
//! Maps a command name to a handler and turns whatever the handler does,
//! including panicking, into exactly one [`Response`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use scenebridge_protocol::{Command, ErrorKind, Params, Response};

/// A fault raised by a handler while executing a command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerFault {
    #[error("{0}")]
    Message(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Result is not serializable: {0}")]
    Unserializable(String),
}

impl HandlerFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("A handler is already registered for '{0}'")]
    DuplicateHandler(String),
}

/// Unit of work bound to a command name
///
/// Handlers run on the host thread with exclusive access to the document.
pub trait CommandHandler<D>: Send + Sync {
    fn handle(&self, doc: &mut D, params: &Params) -> Result<Value, HandlerFault>;
}

impl<D, F> CommandHandler<D> for F
where
    F: Fn(&mut D, &Params) -> Result<Value, HandlerFault> + Send + Sync,
{
    fn handle(&self, doc: &mut D, params: &Params) -> Result<Value, HandlerFault> {
        self(doc, params)
    }
}

/// Adapt a strongly-typed handler
///
/// Parameters are deserialized into `P` (a shape mismatch is an
/// `InvalidParams` fault) and the returned `R` is serialized back to JSON.
pub fn typed<D, P, R, F>(f: F) -> impl Fn(&mut D, &Params) -> Result<Value, HandlerFault> + Send + Sync
where
    F: Fn(&mut D, P) -> Result<R, HandlerFault> + Send + Sync,
    P: DeserializeOwned,
    R: Serialize,
{
    move |doc: &mut D, params: &Params| {
        let params: P = serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| HandlerFault::invalid_params(e.to_string()))?;
        let result = f(doc, params)?;
        serde_json::to_value(result).map_err(|e| HandlerFault::Unserializable(e.to_string()))
    }
}

/// Name -> handler table, built once before the backend starts
pub struct HandlerRegistry<D> {
    handlers: HashMap<String, Box<dyn CommandHandler<D>>>,
}

impl<D> Default for HandlerRegistry<D> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<D> HandlerRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler value
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> Result<(), RegistryError>
    where
        H: CommandHandler<D> + 'static,
    {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::DuplicateHandler(name));
        }
        debug!(command = %name, "Registered command handler");
        self.handlers.insert(name, Box::new(handler));
        Ok(())
    }

    /// Register a closure
    ///
    /// Same as [`register`](Self::register) but gives closures a concrete
    /// signature to infer against.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&mut D, &Params) -> Result<Value, HandlerFault> + Send + Sync + 'static,
    {
        self.register(name, f)
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Execute one command against the document
    ///
    /// Never panics and never returns anything but a single response.
    pub fn dispatch(&self, doc: &mut D, command: &Command) -> Response {
        let Some(handler) = self.handlers.get(&command.name) else {
            warn!(command = %command.name, "Unknown command");
            return Response::unknown_command(&command.name);
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(doc, &command.params)));

        match outcome {
            Ok(Ok(result)) => Response::success(result),
            Ok(Err(fault)) => {
                warn!(command = %command.name, error = %fault, "Handler failed");
                Response::failure(ErrorKind::HandlerError, fault.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = %command.name, panic = %message, "Handler panicked");
                Response::failure(
                    ErrorKind::HandlerError,
                    format!("Handler panicked: {}", message),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
