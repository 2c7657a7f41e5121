#![forbid(unsafe_code)]
//! On-device integration test orchestration.
//!
//! A controller registers tests in a [`Suite`](testing::Suite), groups them, and drives a
//! [`Scheduler`](scheduler::Scheduler) from its periodic loop. The operator picks which groups to
//! run and reads the results on a remote console connected over TCP; see [`link`] for the wire
//! protocol.
//!
//! ## Layers
//!
//! - [`testing`] - the `Test` trait, its standard variants, groups and assertion helpers
//! - [`scheduler`] - dependency-aware, tick-driven execution of queued groups
//! - [`link`] - the console session state machine and its line protocol
//! - [`results`] - outcomes and the per-group results table
//! - [`cli`] - the `fieldtest` binary: a reference controller and a terminal console
//!
//! ## Panic Policy
//!
//! Production code uses `Result` with `?`. The `cli`, `link`, `results`, `scheduler` and
//! `testing` modules enforce `#![deny(clippy::unwrap_used)]`; `.unwrap()` is acceptable in tests.

pub mod cli;
pub mod link;
pub mod results;
pub mod scheduler;
pub mod testing;
pub mod version;

pub use link::{Console, Link, LinkConfig, LinkError, Pending, ProtocolState};
pub use results::{Outcome, ResultsTable, TestReport};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError};
pub use testing::{Suite, Test, TestContext, TestFault, TestId, TestResult};
