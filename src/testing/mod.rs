//! Test abstraction: the unit of work the scheduler drives, and its standard variants.
//!
//! ## Contract
//!
//! A [`Test`] is driven one cycle at a time:
//!
//! - `setup()` once, when the test reaches the head of the queue with its dependencies satisfied
//! - `periodic()` once per tick while active, followed by `is_done()` if it returned `Ok`
//! - `closedown()` once, after it succeeded or failed
//!
//! Tests live in a [`Suite`] arena and are referred to by [`TestId`]. Dependencies are declared as
//! ids, so the dependency graph is keyed by identity rather than by name.
//!
//! ## Variants
//!
//! - [`InstantTest`] - one action, one cycle
//! - [`OnePhaseTest`] - one action repeated until a predicate holds
//! - [`MultiPhaseTest`] - a sequence of (action, end condition) phases
//! - [`TimedPhaseTest`] - phases that end after fixed durations
//! - [`CombinedTest`] - whole tests sequenced as phases of one test
//! - [`OperatorCheck`] - a yes/no confirmation from the operator

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod check;
pub mod clock;
pub mod errors;
pub mod group;
pub mod instant;
pub mod operator;
pub mod phased;

use std::fmt;

use crate::link::{Console, LinkResult, Pending};

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::{ConfigError, TestFault, TestResult};
pub use group::{GroupBuilder, Suite, TestGroup};
pub use instant::{InstantTest, OnePhaseTest};
pub use operator::OperatorCheck;
pub use phased::{CombinedTest, MultiPhaseTest, TimedPhaseTest};

// ============================================================================
// Identities
// ============================================================================

/// Stable identity of a test within a [`Suite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId(pub(crate) usize);

impl TestId {
    /// Position of the test in its suite's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a test group within a [`Suite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    /// Position of the group in its suite.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

// ============================================================================
// Test trait
// ============================================================================

/// A stateful, possibly multi-cycle unit of work.
pub trait Test {
    /// Called once before the first `periodic()` call of a run.
    fn setup(&mut self) {}

    /// The main body of the test, called once per tick until `is_done()` or a fault.
    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult;

    /// Whether the test has finished. Consulted right after each successful `periodic()`.
    fn is_done(&self) -> bool;

    /// Called once after the test succeeded or failed.
    fn closedown(&mut self) {}

    /// Display name used in reports. Need not be unique.
    fn name(&self) -> &str;

    /// Tests that must have an outcome before this one may run.
    fn dependencies(&self) -> &[TestId] {
        &[]
    }

    /// Required outcome per dependency: `true` if it must succeed, `false` if it must fail.
    fn dependency_requirements(&self) -> Vec<bool> {
        vec![true; self.dependencies().len()]
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Dependency ids together with their required outcomes.
///
/// Used by the standard variants; guarantees both lists have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    ids: Vec<TestId>,
    requirements: Vec<bool>,
}

impl Dependencies {
    /// No dependencies.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every dependency must succeed.
    pub fn all_succeed(ids: impl IntoIterator<Item = TestId>) -> Self {
        let ids: Vec<TestId> = ids.into_iter().collect();
        let requirements = vec![true; ids.len()];
        Self { ids, requirements }
    }

    /// Explicit requirement per dependency.
    pub fn with_requirements(ids: Vec<TestId>, requirements: Vec<bool>) -> Result<Self, ConfigError> {
        if ids.len() != requirements.len() {
            return Err(ConfigError::DependencyListMismatch {
                dependencies: ids.len(),
                requirements: requirements.len(),
            });
        }
        Ok(Self { ids, requirements })
    }

    /// Build from `(id, must_succeed)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TestId, bool)>) -> Self {
        let (ids, requirements) = pairs.into_iter().unzip();
        Self { ids, requirements }
    }

    pub fn ids(&self) -> &[TestId] {
        &self.ids
    }

    pub fn requirements(&self) -> &[bool] {
        &self.requirements
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// Test context
// ============================================================================

/// What a test body may reach while it runs.
pub struct TestContext<'a> {
    cycle: u64,
    console: &'a dyn Console,
}

impl<'a> TestContext<'a> {
    pub fn new(cycle: u64, console: &'a dyn Console) -> Self {
        Self { cycle, console }
    }

    /// Scheduler cycle counter at the time of this call.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// The operator console.
    pub fn console(&self) -> &dyn Console {
        self.console
    }

    /// Ask the operator a yes/no question.
    ///
    /// The answer arrives later; poll the returned handle on subsequent cycles.
    pub fn ask_user(&self, question: &str, yes_label: &str, no_label: &str) -> LinkResult<Pending<bool>> {
        self.console.ask_question(question, yes_label, no_label)
    }

    /// [`TestContext::ask_user`] with `Yes` / `No` labels.
    pub fn ask(&self, question: &str) -> LinkResult<Pending<bool>> {
        self.ask_user(question, "Yes", "No")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Bare;

    impl Test for Bare {
        fn periodic(&mut self, _cx: &mut TestContext<'_>) -> TestResult {
            Ok(())
        }

        fn is_done(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "bare"
        }
    }

    #[test]
    fn test_default_dependencies_are_empty() {
        let test = Bare;
        assert!(test.dependencies().is_empty());
        assert!(test.dependency_requirements().is_empty());
    }

    #[test]
    fn test_all_succeed_requirements_match_length() {
        let deps = Dependencies::all_succeed([TestId(0), TestId(3)]);
        assert_eq!(deps.ids(), &[TestId(0), TestId(3)]);
        assert_eq!(deps.requirements(), &[true, true]);
    }

    #[test]
    fn test_with_requirements_rejects_length_mismatch() {
        let err = Dependencies::with_requirements(vec![TestId(0)], vec![true, false]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DependencyListMismatch {
                dependencies: 1,
                requirements: 2
            }
        );
        assert_eq!(err.to_string(), "1 dependencies given with 2 success requirements");
    }

    #[test]
    fn test_from_pairs_keeps_order() {
        let deps = Dependencies::from_pairs([(TestId(2), false), (TestId(1), true)]);
        assert_eq!(deps.ids(), &[TestId(2), TestId(1)]);
        assert_eq!(deps.requirements(), &[false, true]);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TestId(7).to_string(), "#7");
        assert_eq!(GroupId(2).to_string(), "group#2");
    }
}
