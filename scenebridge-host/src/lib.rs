//! scenebridge-host: the in-application half of the command bridge
//!
//! The host application owns a document that is not safe for concurrent
//! mutation. This crate splits the work in two:
//!
//! - [`SocketBackend`] runs on the tokio runtime, accepts one connection at a
//!   time and decodes commands off the socket.
//! - [`HostExecutor`] lives on the host's own thread, owns the document and
//!   the [`HandlerRegistry`], and executes commands one at a time.
//!
//! The two sides meet through a [`HostHandle`], a queue of depth one.

pub mod backend;
pub mod dispatch;
pub mod executor;
pub mod handlers;
pub mod scene;
pub mod script;
pub mod state;

pub use backend::{BackendError, BackendHandle, SocketBackend};
pub use dispatch::{typed, CommandHandler, HandlerFault, HandlerRegistry, RegistryError};
pub use executor::{spawn_host_thread, HostExecutor, HostGone, HostHandle, Pump};
pub use handlers::{register_scene_handlers, scene_registry};
pub use scene::Scene;
pub use script::{SceneScript, ScriptEngine, ScriptError};
pub use state::BridgeState;
