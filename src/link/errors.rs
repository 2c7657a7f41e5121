//! Errors raised by console exchanges.

use std::time::Duration;

use thiserror::Error;

use super::ProtocolState;
use super::protocol::ProtocolViolation;
use crate::testing::TestFault;

/// Failure of a link operation, either immediately or through its [`Pending`](super::Pending).
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no operator console has connected; start one on the operator station and try again")]
    NoConnection,

    #[error("protocol forbids this action while {actual} (requires {expected})")]
    WrongState {
        expected: ProtocolState,
        actual: ProtocolState,
    },

    #[error("another console exchange is still in flight")]
    Busy,

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("console closed the connection")]
    ConnectionClosed,

    #[error("console did not answer within {0:?}")]
    Timeout(Duration),

    #[error("link worker stopped before the exchange completed")]
    WorkerStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether the connection is unusable after this error.
    ///
    /// A timed-out exchange leaves the stream at an unknown position, so it counts as lost.
    pub fn loses_connection(&self) -> bool {
        matches!(self, LinkError::ConnectionClosed | LinkError::Timeout(_) | LinkError::Io(_))
    }
}

/// A test body that cannot reach the console is broken, not failed.
impl From<LinkError> for TestFault {
    fn from(err: LinkError) -> Self {
        TestFault::Fatal(err.to_string())
    }
}

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
