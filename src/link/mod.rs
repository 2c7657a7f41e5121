//! Link to the operator console: a TCP line protocol with an explicit session state machine.
//!
//! ```text
//! Disconnected --accept--> Holding --selection answered--> Running --results sent--> Holding
//! ```
//!
//! The controller listens; the console connects. A [`Link`] binds on construction and accepts
//! connections in the background. Operations never block the caller: each one is validated
//! against the session state, handed to a single worker task, and answered through a
//! [`Pending`] handle.
//!
//! The scheduler only needs the [`Console`] trait, implemented by [`Link`] for the real wire and by
//! [`ScriptedConsole`](scripted::ScriptedConsole) for runs without an operator.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod errors;
pub mod pending;
pub mod protocol;
pub mod scripted;
mod session;
mod worker;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::results::ResultsTable;

pub use config::LinkConfig;
pub use errors::{LinkError, LinkResult};
pub use pending::{Pending, Resolver, pending};
pub use protocol::ProtocolViolation;
pub use scripted::ScriptedConsole;

use session::Session;
use worker::Job;

// ============================================================================
// Protocol state
// ============================================================================

/// Session state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// No console attached.
    Disconnected,
    /// Attached, waiting for a group selection to be requested.
    Holding,
    /// Selection made; tests are running and may ask questions.
    Running,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProtocolState::Disconnected => "disconnected",
            ProtocolState::Holding => "holding",
            ProtocolState::Running => "running",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Console seam
// ============================================================================

/// What the scheduler and test bodies need from the operator console.
///
/// Operations reject immediately (wrong state, no connection, exchange in flight) without
/// touching the session; otherwise they return a handle that completes with the console's answer.
pub trait Console {
    fn state(&self) -> ProtocolState;

    /// Ask the operator which groups to run. Requires `Holding`; moves to `Running` on success.
    fn request_group_selection(&self, names: &[String]) -> LinkResult<Pending<Vec<bool>>>;

    /// Ask a yes/no question. Requires `Running`.
    fn ask_question(&self, question: &str, true_label: &str, false_label: &str) -> LinkResult<Pending<bool>>;

    /// Send the results table. Requires `Running`; moves to `Holding` once sent.
    fn publish_results(&self, results: &ResultsTable) -> LinkResult<Pending<()>>;

    /// Drop the current session and wait for a console afresh.
    fn reset(&mut self) -> LinkResult<()>;
}

// ============================================================================
// Link
// ============================================================================

/// Network implementation of [`Console`].
///
/// Uses the tokio runtime current at construction; outside a runtime it starts a small private
/// one that lives as long as the link.
#[derive(Debug)]
pub struct Link {
    session: Arc<Session>,
    config: LinkConfig,
    local_addr: SocketAddr,
    handle: Handle,
    acceptor: JoinHandle<()>,
    worker: JoinHandle<()>,
    runtime: Option<Runtime>,
}

impl Link {
    /// Bind the listener and start accepting consoles.
    #[tracing::instrument(skip_all, fields(addr = %config.bind_addr))]
    pub fn bind(config: LinkConfig) -> LinkResult<Self> {
        let (runtime, handle) = match Handle::try_current() {
            Ok(handle) => (None, handle),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .thread_name("fieldtest-link")
                    .enable_all()
                    .build()?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let listener = std::net::TcpListener::bind(config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let listener = {
            let _entered = handle.enter();
            tokio::net::TcpListener::from_std(listener)?
        };

        let (jobs, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(jobs));
        let worker = handle.spawn(worker::run(Arc::clone(&session), 0, rx, config.clone()));
        let acceptor = handle.spawn(worker::accept_loop(listener, Arc::clone(&session)));
        info!(addr = %local_addr, "TCP server started");

        Ok(Self {
            session,
            config,
            local_addr,
            handle,
            acceptor,
            worker,
            runtime,
        })
    }

    /// Address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address of the attached console, if any.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.session.peer()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Console for Link {
    fn state(&self) -> ProtocolState {
        self.session.state()
    }

    fn request_group_selection(&self, names: &[String]) -> LinkResult<Pending<Vec<bool>>> {
        let (reply, handle) = pending();
        self.session.dispatch(
            ProtocolState::Holding,
            Job::Select {
                names: names.to_vec(),
                reply,
            },
        )?;
        Ok(handle)
    }

    fn ask_question(&self, question: &str, true_label: &str, false_label: &str) -> LinkResult<Pending<bool>> {
        let (reply, handle) = pending();
        self.session.dispatch(
            ProtocolState::Running,
            Job::Ask {
                question: question.to_string(),
                true_label: true_label.to_string(),
                false_label: false_label.to_string(),
                reply,
            },
        )?;
        Ok(handle)
    }

    fn publish_results(&self, results: &ResultsTable) -> LinkResult<Pending<()>> {
        let (reply, handle) = pending();
        self.session.dispatch(
            ProtocolState::Running,
            Job::Publish {
                payload: protocol::encode_results(results),
                reply,
            },
        )?;
        Ok(handle)
    }

    /// Stops the worker (in-flight handles complete with [`LinkError::WorkerStopped`]), closes the
    /// console connection, and keeps the listener open for the next console.
    fn reset(&mut self) -> LinkResult<()> {
        self.worker.abort();
        let (jobs, rx) = mpsc::unbounded_channel();
        let epoch = self.session.reset(jobs);
        self.worker = self
            .handle
            .spawn(worker::run(Arc::clone(&self.session), epoch, rx, self.config.clone()));
        info!(addr = %self.local_addr, "link session reset; waiting for a console");
        Ok(())
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.acceptor.abort();
        self.worker.abort();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
