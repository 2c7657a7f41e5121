//! Dependency-aware, tick-driven test scheduler.
//!
//! The host calls [`Scheduler::tick`] at a fixed period. Each tick does a bounded amount of work
//! and never blocks on the console:
//!
//! 1. **Warm-up**: a few idle ticks so the operator console can attach.
//! 2. **Selecting**: the queued group names go to the console; later ticks poll for the answer and
//!    drop the groups the operator deselected.
//! 3. **Running**: the front group's tests are driven one cycle per tick. A test whose
//!    dependencies have no outcome yet is moved behind them; a test whose dependencies ended the
//!    wrong way is recorded as not run.
//! 4. **Drained**: the results table is published once.
//!
//! Dependency outcomes are shared across groups, so a test may depend on a test of another group;
//! the dependency then runs (and is reported) inside the group that needed it.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::link::{Console, Link, LinkError, Pending};
use crate::results::{Outcome, ResultsTable, TestReport};
use crate::testing::{ConfigError, GroupId, Suite, TestContext, TestFault, TestId};

pub use config::SchedulerConfig;

/// Message recorded for a test skipped because of its dependencies.
pub const DEPENDENCIES_NOT_CORRECT: &str = "Dependencies Not Correct";

// ============================================================================
// Errors
// ============================================================================

/// A tick could not complete normally.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid test configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("test '{test}' aborted the run: {message}")]
    Fatal { test: String, message: String },

    #[error("console link: {0}")]
    Link(#[from] LinkError),

    #[error("dependency cycle among queued tests: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

impl SchedulerError {
    /// Whether the run cannot continue. Link errors are retried on later ticks.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SchedulerError::Link(_))
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

// ============================================================================
// Phases
// ============================================================================

/// Where the scheduler is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WarmUp { remaining: u32 },
    Selecting,
    Running,
    Drained,
}

enum Readiness {
    Ready,
    Waiting,
    Incorrect,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs queued test groups against a [`Console`].
pub struct Scheduler<C: Console = Link> {
    suite: Suite,
    console: C,
    config: SchedulerConfig,
    phase: Phase,
    groups: VecDeque<GroupId>,
    queue: VecDeque<TestId>,
    head_started: bool,
    outcomes: HashMap<TestId, Outcome>,
    results: ResultsTable,
    cycles: u64,
    /// Consecutive deferrals without any test running or being recorded.
    deferrals: usize,
    selection: Option<Pending<Vec<bool>>>,
    publication: Option<Pending<()>>,
}

impl<C: Console> Scheduler<C> {
    pub fn new(suite: Suite, console: C, config: SchedulerConfig) -> Self {
        let phase = Phase::WarmUp {
            remaining: config.warmup_ticks,
        };
        Self {
            suite,
            console,
            config,
            phase,
            groups: VecDeque::new(),
            queue: VecDeque::new(),
            head_started: false,
            outcomes: HashMap::new(),
            results: ResultsTable::new(),
            cycles: 0,
            deferrals: 0,
            selection: None,
            publication: None,
        }
    }

    /// Reset all run state and clear the group queue.
    #[tracing::instrument(skip_all, fields(warmup_ticks = self.config.warmup_ticks))]
    pub fn init(&mut self) {
        self.phase = Phase::WarmUp {
            remaining: self.config.warmup_ticks,
        };
        self.groups.clear();
        self.queue.clear();
        self.head_started = false;
        self.outcomes.clear();
        self.results = ResultsTable::new();
        self.cycles = 0;
        self.deferrals = 0;
        self.selection = None;
        self.publication = None;
        info!("test run initialised");
    }

    /// Append a group to the run.
    pub fn queue_group(&mut self, group: GroupId) -> SchedulerResult<()> {
        let name = self.suite.group_by_id(group)?.name();
        debug!(group = name, "group queued");
        self.groups.push_back(group);
        Ok(())
    }

    /// The session ended: replace the console session.
    pub fn on_disable(&mut self) -> SchedulerResult<()> {
        info!("disabled; resetting console session");
        self.console.reset()?;
        Ok(())
    }

    /// Advance the run by one step.
    pub fn tick(&mut self) -> SchedulerResult<()> {
        match self.phase {
            Phase::WarmUp { remaining } if remaining > 0 => {
                self.phase = Phase::WarmUp { remaining: remaining - 1 };
                Ok(())
            }
            Phase::WarmUp { .. } => {
                self.phase = Phase::Selecting;
                self.request_selection()
            }
            Phase::Selecting => self.poll_selection(),
            Phase::Running => self.run_cycle(),
            Phase::Drained => self.poll_publication(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ticks spent in the running phase.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn results(&self) -> &ResultsTable {
        &self.results
    }

    /// Outcome recorded for a test in this run.
    pub fn outcome(&self, test: TestId) -> Option<Outcome> {
        self.outcomes.get(&test).copied()
    }

    /// Groups still to run, front first.
    pub fn queued_groups(&self) -> Vec<GroupId> {
        self.groups.iter().copied().collect()
    }

    /// Whether the results have been handed to the console.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Drained
    }

    /// Whether a results publication is still in flight.
    pub fn publication_pending(&self) -> bool {
        self.publication.is_some()
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    fn request_selection(&mut self) -> SchedulerResult<()> {
        let names = self
            .groups
            .iter()
            .map(|&id| self.suite.group_by_id(id).map(|g| g.name().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let handle = self.console.request_group_selection(&names)?;
        info!(groups = names.len(), "test group selection requested");
        self.selection = Some(handle);
        Ok(())
    }

    fn poll_selection(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.selection.as_mut() else {
            return self.request_selection();
        };
        match handle.try_take() {
            None => Ok(()),
            Some(Ok(selection)) => {
                self.selection = None;
                self.apply_selection(&selection);
                self.phase = Phase::Running;
                Ok(())
            }
            Some(Err(err)) => {
                self.selection = None;
                Err(err.into())
            }
        }
    }

    /// Remove every deselected group, front to back.
    fn apply_selection(&mut self, selection: &[bool]) {
        let mut removed = 0;
        for (index, keep) in selection.iter().enumerate() {
            if !keep {
                self.groups.remove(index - removed);
                removed += 1;
            }
        }
        info!(kept = self.groups.len(), removed, "test group selection received");
    }

    // ------------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------------

    fn run_cycle(&mut self) -> SchedulerResult<()> {
        self.cycles += 1;

        let Some(&group) = self.groups.front() else {
            return self.publish();
        };
        let group_name = self.suite.group_by_id(group)?.name().to_string();
        self.results.group_mut(&group_name);

        if self.queue.is_empty() {
            let tests = self.suite.group_by_id(group)?.full_tests();
            self.queue
                .extend(tests.into_iter().filter(|id| !self.outcomes.contains_key(id)));
            self.head_started = false;
            self.deferrals = 0;
            if self.queue.is_empty() {
                debug!(group = %group_name, "no runnable tests in group");
                self.groups.pop_front();
                return Ok(());
            }
            debug!(group = %group_name, tests = self.queue.len(), "group started");
        }

        let Some(&head) = self.queue.front() else {
            return Ok(());
        };

        // A test runs at most once per run, however often it is queued.
        if !self.head_started && self.outcomes.contains_key(&head) {
            debug!(test = self.suite.test(head)?.name(), group = %group_name, "already recorded; skipped");
            self.advance();
            return Ok(());
        }

        if !self.head_started {
            match self.readiness(head)? {
                Readiness::Ready => {
                    let test = self.suite.test_mut(head)?;
                    debug!(test = test.name(), group = %group_name, "test started");
                    test.setup();
                    self.head_started = true;
                    self.deferrals = 0;
                }
                Readiness::Waiting => return self.defer(head),
                Readiness::Incorrect => {
                    let name = self.suite.test(head)?.name().to_string();
                    debug!(test = %name, group = %group_name, "dependencies not correct; not run");
                    self.record(
                        head,
                        &group_name,
                        &name,
                        TestReport::new(Outcome::NotRun, DEPENDENCIES_NOT_CORRECT),
                    );
                    self.advance();
                    return Ok(());
                }
            }
        }

        self.run_head(head, &group_name)
    }

    /// Check the head's dependencies in order, stopping at the first wrong outcome.
    fn readiness(&self, head: TestId) -> SchedulerResult<Readiness> {
        let test = self.suite.test(head)?;
        let dependencies = test.dependencies();
        let requirements = test.dependency_requirements();
        if dependencies.len() != requirements.len() {
            return Err(ConfigError::RequirementCountMismatch {
                test: test.name().to_string(),
                dependencies: dependencies.len(),
                requirements: requirements.len(),
            }
            .into());
        }

        let mut all_done = true;
        for (dependency, &must_succeed) in dependencies.iter().zip(&requirements) {
            match self.outcomes.get(dependency) {
                None => all_done = false,
                Some(outcome) if !outcome.satisfies(must_succeed) => return Ok(Readiness::Incorrect),
                Some(_) => {}
            }
        }
        Ok(if all_done { Readiness::Ready } else { Readiness::Waiting })
    }

    /// Queue the head's missing dependencies right behind it, then move it to the back.
    fn defer(&mut self, head: TestId) -> SchedulerResult<()> {
        let dependencies = self.suite.test(head)?.dependencies().to_vec();
        let mut at = 1;
        for dependency in dependencies {
            self.suite.test(dependency)?;
            if !self.outcomes.contains_key(&dependency) && !self.queue.contains(&dependency) {
                self.queue.insert(at, dependency);
                at += 1;
            }
        }
        self.queue.rotate_left(1);
        self.deferrals += 1;

        debug!(
            test = self.suite.test(head)?.name(),
            inserted = at - 1,
            "dependencies pending; test deferred"
        );

        if self.deferrals > self.queue.len() {
            let names = self
                .queue
                .iter()
                .map(|&id| self.suite.test(id).map(|t| t.name().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            return Err(SchedulerError::DependencyCycle(names));
        }
        Ok(())
    }

    fn run_head(&mut self, head: TestId, group_name: &str) -> SchedulerResult<()> {
        let test = self.suite.test_mut(head)?;
        let mut cx = TestContext::new(self.cycles, &self.console);

        let report = match test.periodic(&mut cx) {
            Ok(()) if test.is_done() => TestReport::success(),
            Ok(()) => return Ok(()),
            Err(TestFault::Failure(message)) => TestReport::new(Outcome::Fail, message),
            Err(TestFault::Fatal(message)) => {
                return Err(SchedulerError::Fatal {
                    test: test.name().to_string(),
                    message,
                });
            }
        };

        test.closedown();
        let name = test.name().to_string();
        debug!(test = %name, group = group_name, outcome = %report.outcome, "test finished");
        self.record(head, group_name, &name, report);
        self.advance();
        Ok(())
    }

    fn record(&mut self, test: TestId, group_name: &str, test_name: &str, report: TestReport) {
        self.outcomes.insert(test, report.outcome);
        self.results.record(group_name, test_name, report);
    }

    fn advance(&mut self) {
        self.queue.pop_front();
        self.head_started = false;
        self.deferrals = 0;
        if self.queue.is_empty() {
            self.groups.pop_front();
        }
    }

    // ------------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(cycles = self.cycles))]
    fn publish(&mut self) -> SchedulerResult<()> {
        let summary = self.results.summary();
        match self.console.publish_results(&self.results) {
            Ok(handle) => {
                info!(%summary, "all groups drained; publishing results");
                self.publication = Some(handle);
                self.phase = Phase::Drained;
                Ok(())
            }
            Err(LinkError::Busy) => {
                debug!("console busy; publishing on a later tick");
                Ok(())
            }
            Err(err) => {
                warn!(%summary, error = %err, "results could not be published");
                self.phase = Phase::Drained;
                Err(err.into())
            }
        }
    }

    fn poll_publication(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.publication.as_mut() else {
            return Ok(());
        };
        match handle.try_take() {
            None => Ok(()),
            Some(Ok(())) => {
                self.publication = None;
                info!("results published");
                Ok(())
            }
            Some(Err(err)) => {
                self.publication = None;
                Err(err.into())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
