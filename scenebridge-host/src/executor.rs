//! Host-thread executor
//!
//! The document lives on the host application's thread and is never touched
//! from anywhere else. The socket backend hands commands over through a
//! channel of depth one and awaits a oneshot reply per command.

use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use scenebridge_protocol::{Command, Response};

use crate::dispatch::HandlerRegistry;

/// The executor is gone: its thread exited or it was shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("host executor is no longer running")]
pub struct HostGone;

/// Outcome of [`HostExecutor::pump_pending`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// One command was executed
    Executed,
    /// Nothing was queued
    Idle,
    /// Shutdown was requested or every handle is gone; stop pumping
    Stopped,
}

enum Job {
    Execute {
        command: Command,
        reply: oneshot::Sender<Response>,
    },
    Shutdown,
}

/// Backend-side handle used to submit commands to the host thread
#[derive(Clone)]
pub struct HostHandle {
    jobs: mpsc::Sender<Job>,
}

impl HostHandle {
    /// Run a command on the host thread and wait for its response
    ///
    /// Waits for the previous command to be picked up first; at most one
    /// command is ever queued.
    pub async fn submit(&self, command: Command) -> Result<Response, HostGone> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Execute { command, reply })
            .await
            .map_err(|_| HostGone)?;
        response.await.map_err(|_| HostGone)
    }

    /// Ask the executor to return from [`HostExecutor::run`]
    pub async fn shutdown(&self) -> Result<(), HostGone> {
        self.jobs.send(Job::Shutdown).await.map_err(|_| HostGone)
    }

    /// Whether the executor has gone away
    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }
}

/// Owner of the document and the handler registry, pinned to the host thread
pub struct HostExecutor<D> {
    document: D,
    registry: HandlerRegistry<D>,
    jobs: mpsc::Receiver<Job>,
    executed: u64,
    stopped: bool,
}

impl<D> HostExecutor<D> {
    /// Create an executor and the handle the backend submits through
    pub fn new(document: D, registry: HandlerRegistry<D>) -> (Self, HostHandle) {
        let (tx, rx) = mpsc::channel(1);
        let executor = Self {
            document,
            registry,
            jobs: rx,
            executed: 0,
            stopped: false,
        };
        (executor, HostHandle { jobs: tx })
    }

    /// Block the current thread executing commands
    ///
    /// Returns the document once every [`HostHandle`] is dropped or
    /// [`HostHandle::shutdown`] is called. Must not be called from inside an
    /// async context.
    pub fn run(mut self) -> D {
        info!("Host executor running");
        while let Some(job) = self.jobs.blocking_recv() {
            if !self.execute(job) {
                break;
            }
        }
        info!(executed = self.executed, "Host executor stopped");
        self.document
    }

    /// Execute at most one queued command without blocking
    ///
    /// For hosts that drive work from an idle callback. Once it returns
    /// [`Pump::Stopped`] it keeps doing so and further submissions fail
    /// with [`HostGone`].
    pub fn pump_pending(&mut self) -> Pump {
        if self.stopped {
            return Pump::Stopped;
        }
        match self.jobs.try_recv() {
            Ok(job @ Job::Execute { .. }) => {
                self.execute(job);
                Pump::Executed
            }
            Ok(Job::Shutdown) | Err(mpsc::error::TryRecvError::Disconnected) => {
                self.stopped = true;
                self.jobs.close();
                info!(executed = self.executed, "Host executor stopped");
                Pump::Stopped
            }
            Err(mpsc::error::TryRecvError::Empty) => Pump::Idle,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    /// Number of commands executed so far
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn into_document(self) -> D {
        self.document
    }

    fn execute(&mut self, job: Job) -> bool {
        match job {
            Job::Execute { command, reply } => {
                trace!(command = %command.name, "Executing on host thread");
                let response = self.registry.dispatch(&mut self.document, &command);
                self.executed += 1;
                if reply.send(response).is_err() {
                    // The waiting connection was dropped (timeout or supersede)
                    debug!(command = %command.name, "Response discarded, caller gone");
                }
                true
            }
            Job::Shutdown => false,
        }
    }
}

/// Run an executor on a dedicated named thread
///
/// Stands in for the host application's main thread in the demo binary and
/// in tests. Joining the thread yields the document back.
pub fn spawn_host_thread<D>(
    name: &str,
    document: D,
    registry: HandlerRegistry<D>,
) -> std::io::Result<(HostHandle, JoinHandle<D>)>
where
    D: Send + 'static,
{
    let (executor, handle) = HostExecutor::new(document, registry);
    let thread = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || executor.run())?;
    Ok((handle, thread))
}
