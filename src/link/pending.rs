//! Completion handles for console exchanges.
//!
//! Every link operation returns immediately with a [`Pending`]; the answer arrives once the
//! console replies. The scheduler polls with [`Pending::try_take`] once per tick, async callers
//! `.await` [`Pending::wait`].

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::{LinkError, LinkResult};

/// Receiving end of an exchange.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<LinkResult<T>>,
    taken: bool,
}

/// Sending end of an exchange, held by whoever performs it.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<LinkResult<T>>,
}

/// A connected resolver/handle pair.
pub fn pending<T>() -> (Resolver<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Pending { rx, taken: false })
}

impl<T> Resolver<T> {
    /// Complete the exchange. A dropped handle is not an error.
    pub fn resolve(self, result: LinkResult<T>) {
        let _ = self.tx.send(result);
    }
}

impl<T> Pending<T> {
    /// A handle that is already complete.
    pub fn ready(result: LinkResult<T>) -> Self {
        let (resolver, pending) = pending();
        resolver.resolve(result);
        pending
    }

    /// The result, if it has arrived. Yields it once; afterwards always `None`.
    ///
    /// A resolver dropped without answering (the worker stopped) yields
    /// [`LinkError::WorkerStopped`].
    pub fn try_take(&mut self) -> Option<LinkResult<T>> {
        if self.taken {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(LinkError::WorkerStopped),
        };
        self.taken = true;
        Some(result)
    }

    /// Whether [`Pending::try_take`] already handed out the result.
    pub fn is_taken(&self) -> bool {
        self.taken
    }

    /// Wait for the result.
    pub async fn wait(self) -> LinkResult<T> {
        if self.taken {
            return Err(LinkError::WorkerStopped);
        }
        self.rx.await.unwrap_or(Err(LinkError::WorkerStopped))
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_wait(self) -> LinkResult<T> {
        if self.taken {
            return Err(LinkError::WorkerStopped);
        }
        self.rx.blocking_recv().unwrap_or(Err(LinkError::WorkerStopped))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_try_take_before_and_after_resolve() {
        let (resolver, mut handle) = pending::<bool>();
        assert!(handle.try_take().is_none());
        resolver.resolve(Ok(true));
        assert!(handle.try_take().unwrap().unwrap());
        assert!(handle.is_taken());
        assert!(handle.try_take().is_none());
    }

    #[test]
    fn test_dropped_resolver_reports_worker_stopped() {
        let (resolver, mut handle) = pending::<()>();
        drop(resolver);
        assert!(matches!(handle.try_take(), Some(Err(LinkError::WorkerStopped))));
    }

    #[test]
    fn test_ready_handle() {
        let mut handle = Pending::ready(Ok(vec![true, false]));
        assert_eq!(handle.try_take().unwrap().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_blocking_wait_across_threads() {
        let (resolver, handle) = pending::<bool>();
        let answer = std::thread::spawn(move || handle.blocking_wait());
        resolver.resolve(Ok(false));
        assert!(!answer.join().unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_wait_resolves() {
        let (resolver, handle) = pending::<u8>();
        tokio::spawn(async move { resolver.resolve(Ok(7)) });
        assert_eq!(handle.wait().await.unwrap(), 7);
    }
}
