//! Link configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::protocol::DEFAULT_PORT;

/// Where the link listens and how long it waits for the console.
///
/// Timeouts are off by default: an operator may take as long as they like to choose groups or
/// answer a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Address the TCP listener binds to. Port `0` picks a free port.
    pub bind_addr: SocketAddr,
    /// Limit for question and results exchanges.
    pub exchange_timeout: Option<Duration>,
    /// Limit for the group selection exchange.
    pub selection_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            exchange_timeout: None,
            selection_timeout: None,
        }
    }
}

impl LinkConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Loopback on a free port.
    pub fn loopback() -> Self {
        Self::default().with_bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = Some(timeout);
        self
    }

    pub fn with_selection_timeout(mut self, timeout: Duration) -> Self {
        self.selection_timeout = Some(timeout);
        self
    }
}
