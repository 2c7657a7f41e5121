//! Error types raised by test authoring and test bodies.
//!
//! Two categories are kept apart for diagnostics:
//!
//! - [`ConfigError`]: the suite itself is malformed (mismatched phase lists, unknown ids, ...).
//!   These indicate an authoring bug and abort the run.
//! - [`TestFault`]: what a test body returns from `periodic()`. A [`TestFault::Failure`] is an
//!   ordinary test result; a [`TestFault::Fatal`] is an authoring bug surfacing at run time.

use thiserror::Error;

use super::{GroupId, TestId};

/// Malformed test or suite construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("number of phases ({phases}) must equal number of phase end conditions ({conditions})")]
    PhaseCountMismatch { phases: usize, conditions: usize },

    #[error("test '{test}' declares {dependencies} dependencies but {requirements} success requirements")]
    RequirementCountMismatch {
        test: String,
        dependencies: usize,
        requirements: usize,
    },

    #[error("{dependencies} dependencies given with {requirements} success requirements")]
    DependencyListMismatch { dependencies: usize, requirements: usize },

    #[error("a timed-phase test needs at least one phase duration")]
    NoPhases,

    #[error("unknown test id {0}")]
    UnknownTest(TestId),

    #[error("unknown test group id {0}")]
    UnknownGroup(GroupId),
}

/// Signal raised by a test body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestFault {
    /// The test ran and its checks failed. Recorded as a `Fail` result.
    #[error("{0}")]
    Failure(String),

    /// Anything that is not a test result: the test body is broken.
    #[error("fatal error in test body: {0}")]
    Fatal(String),
}

impl TestFault {
    /// Shorthand for a failure with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Shorthand for a fatal fault with the given message.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

impl From<ConfigError> for TestFault {
    fn from(err: ConfigError) -> Self {
        TestFault::Fatal(err.to_string())
    }
}

/// Result type returned by test bodies.
pub type TestResult<T = ()> = Result<T, TestFault>;
