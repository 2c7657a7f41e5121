//! Shared session state: protocol state, connection presence, in-flight flag.
//!
//! Every check-and-transition happens under one lock, so an operation is either rejected before it
//! reaches the worker or dispatched with the session marked busy.

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc};

use super::worker::{Connection, Job};
use super::{LinkError, LinkResult, ProtocolState};

#[derive(Debug)]
struct SessionState {
    state: ProtocolState,
    peer: Option<SocketAddr>,
    busy: bool,
    /// Bumped on every reset; a worker from an older epoch no longer owns the session.
    epoch: u64,
    jobs: mpsc::UnboundedSender<Job>,
}

#[derive(Debug)]
pub(crate) struct Session {
    inner: Mutex<SessionState>,
    changed: Notify,
}

impl Session {
    pub(crate) fn new(jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            inner: Mutex::new(SessionState {
                state: ProtocolState::Disconnected,
                peer: None,
                busy: false,
                epoch: 0,
                jobs,
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ProtocolState {
        self.lock().state
    }

    pub(crate) fn peer(&self) -> Option<SocketAddr> {
        self.lock().peer
    }

    /// Validate and hand a job to the worker, marking the session busy.
    pub(crate) fn dispatch(&self, expected: ProtocolState, job: Job) -> LinkResult<()> {
        let mut inner = self.lock();
        if inner.peer.is_none() {
            return Err(LinkError::NoConnection);
        }
        if inner.state != expected {
            return Err(LinkError::WrongState {
                expected,
                actual: inner.state,
            });
        }
        if inner.busy {
            return Err(LinkError::Busy);
        }
        inner.jobs.send(job).map_err(|_| LinkError::WorkerStopped)?;
        inner.busy = true;
        Ok(())
    }

    /// Give a freshly accepted connection to the worker and enter `Holding`.
    pub(crate) fn attach(&self, connection: Connection) -> LinkResult<()> {
        let peer = connection.peer();
        let mut inner = self.lock();
        inner
            .jobs
            .send(Job::Attach(connection))
            .map_err(|_| LinkError::WorkerStopped)?;
        inner.peer = Some(peer);
        inner.state = ProtocolState::Holding;
        inner.busy = false;
        Ok(())
    }

    /// An exchange completed; move to `next` if it succeeded.
    pub(crate) fn finish(&self, epoch: u64, next: Option<ProtocolState>) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.busy = false;
        if let Some(next) = next {
            inner.state = next;
        }
    }

    /// The connection is gone; wake the accept loop.
    pub(crate) fn lose_connection(&self, epoch: u64) {
        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return;
            }
            inner.busy = false;
            inner.peer = None;
            inner.state = ProtocolState::Disconnected;
        }
        self.changed.notify_waiters();
    }

    /// Forget the current connection and route jobs to a new worker. Returns the new epoch.
    pub(crate) fn reset(&self, jobs: mpsc::UnboundedSender<Job>) -> u64 {
        let epoch = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.jobs = jobs;
            inner.busy = false;
            inner.peer = None;
            inner.state = ProtocolState::Disconnected;
            inner.epoch
        };
        self.changed.notify_waiters();
        epoch
    }

    /// Resolves once no console is attached.
    pub(crate) async fn disconnected(&self) {
        loop {
            let notified = self.changed.notified();
            let attached = self.lock().peer.is_some();
            if !attached {
                return;
            }
            notified.await;
        }
    }
}
