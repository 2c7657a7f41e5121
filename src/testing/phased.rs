//! Phased tests: a cursor over (action, end condition) pairs.
//!
//! [`MultiPhaseTest`] is the general form. [`TimedPhaseTest`] derives its end conditions from
//! cumulative durations, and [`CombinedTest`] turns whole tests into phases of one test.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::clock::{Clock, MonotonicClock, Stopwatch};
use super::instant::{Action, Condition};
use super::{ConfigError, Dependencies, Test, TestContext, TestId, TestResult};

// ============================================================================
// Multi-phase
// ============================================================================

/// A test that runs a sequence of phases, each until its end condition holds.
///
/// Each `periodic()` runs the current phase's action, then moves to the next phase if the current
/// phase's end condition holds. The test is done once the cursor is past the last phase.
pub struct MultiPhaseTest {
    name: String,
    actions: Vec<Action>,
    end_conditions: Vec<Condition>,
    phase: usize,
    dependencies: Dependencies,
}

impl MultiPhaseTest {
    /// Build from parallel action and end-condition lists.
    pub fn new(
        name: impl Into<String>,
        actions: Vec<Action>,
        end_conditions: Vec<Condition>,
    ) -> Result<Self, ConfigError> {
        if actions.len() != end_conditions.len() {
            return Err(ConfigError::PhaseCountMismatch {
                phases: actions.len(),
                conditions: end_conditions.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            actions,
            end_conditions,
            phase: 0,
            dependencies: Dependencies::none(),
        })
    }

    /// Start an empty test, to be filled with [`MultiPhaseTest::phase`].
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            end_conditions: Vec::new(),
            phase: 0,
            dependencies: Dependencies::none(),
        }
    }

    /// Append a phase.
    pub fn phase<F, C>(mut self, action: F, end_condition: C) -> Self
    where
        F: FnMut(&mut TestContext<'_>) -> TestResult + 'static,
        C: Fn() -> bool + 'static,
    {
        self.actions.push(Box::new(action));
        self.end_conditions.push(Box::new(end_condition));
        self
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Index of the phase that the next `periodic()` call runs.
    pub fn current_phase(&self) -> usize {
        self.phase
    }

    pub fn phase_count(&self) -> usize {
        self.actions.len()
    }
}

impl Test for MultiPhaseTest {
    fn setup(&mut self) {
        self.phase = 0;
    }

    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        let Some(action) = self.actions.get_mut(self.phase) else {
            return Ok(());
        };
        action(cx)?;
        if (self.end_conditions[self.phase])() {
            self.phase += 1;
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.phase >= self.actions.len()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[TestId] {
        self.dependencies.ids()
    }

    fn dependency_requirements(&self) -> Vec<bool> {
        self.dependencies.requirements().to_vec()
    }
}

// ============================================================================
// Timed phases
// ============================================================================

/// A multi-phase test whose phases end after fixed durations.
///
/// Phase `i` ends once the time since `setup()` reaches the sum of the first `i + 1` durations.
pub struct TimedPhaseTest {
    inner: MultiPhaseTest,
    stopwatch: Rc<Stopwatch>,
    thresholds: Vec<Duration>,
}

impl TimedPhaseTest {
    /// Build with the monotonic system clock.
    pub fn new(
        name: impl Into<String>,
        actions: Vec<Action>,
        durations: Vec<Duration>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(name, actions, durations, MonotonicClock::new())
    }

    /// Build against an explicit time source.
    pub fn with_clock(
        name: impl Into<String>,
        actions: Vec<Action>,
        durations: Vec<Duration>,
        clock: impl Clock + 'static,
    ) -> Result<Self, ConfigError> {
        if durations.is_empty() {
            return Err(ConfigError::NoPhases);
        }
        if actions.len() != durations.len() {
            return Err(ConfigError::PhaseCountMismatch {
                phases: actions.len(),
                conditions: durations.len(),
            });
        }

        let thresholds: Vec<Duration> = durations
            .iter()
            .scan(Duration::ZERO, |total, d| {
                *total += *d;
                Some(*total)
            })
            .collect();

        let stopwatch = Rc::new(Stopwatch::new(Box::new(clock)));
        let end_conditions: Vec<Condition> = thresholds
            .iter()
            .map(|&threshold| {
                let watch = Rc::clone(&stopwatch);
                Box::new(move || watch.elapsed() >= threshold) as Condition
            })
            .collect();

        Ok(Self {
            inner: MultiPhaseTest::new(name, actions, end_conditions)?,
            stopwatch,
            thresholds,
        })
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.inner = self.inner.with_dependencies(dependencies);
        self
    }

    /// Cumulative end time of each phase, measured from `setup()`.
    pub fn thresholds(&self) -> &[Duration] {
        &self.thresholds
    }

    pub fn current_phase(&self) -> usize {
        self.inner.current_phase()
    }
}

impl Test for TimedPhaseTest {
    fn setup(&mut self) {
        self.stopwatch.restart();
        self.inner.setup();
    }

    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        self.inner.periodic(cx)
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dependencies(&self) -> &[TestId] {
        self.inner.dependencies()
    }

    fn dependency_requirements(&self) -> Vec<bool> {
        self.inner.dependency_requirements()
    }
}

// ============================================================================
// Combined
// ============================================================================

type Component = Rc<RefCell<Box<dyn Test>>>;

/// Several tests run back to back as the phases of one test.
///
/// Each component contributes three phases: its `setup()`, its `periodic()` (ending when the
/// component reports done), and its `closedown()`. A component failure fails the combined test.
/// Dependencies declared by the components themselves are not consulted; declare them on the
/// combined test instead.
pub struct CombinedTest {
    inner: MultiPhaseTest,
    components: Vec<Component>,
}

impl CombinedTest {
    pub fn new(name: impl Into<String>, components: Vec<Box<dyn Test>>) -> Self {
        let components: Vec<Component> = components.into_iter().map(|c| Rc::new(RefCell::new(c))).collect();

        let mut inner = MultiPhaseTest::named(name);
        for component in &components {
            let (on_setup, on_periodic, done, on_closedown) = (
                Rc::clone(component),
                Rc::clone(component),
                Rc::clone(component),
                Rc::clone(component),
            );
            inner = inner
                .phase(
                    move |_| {
                        on_setup.borrow_mut().setup();
                        Ok(())
                    },
                    || true,
                )
                .phase(move |cx| on_periodic.borrow_mut().periodic(cx), move || done.borrow().is_done())
                .phase(
                    move |_| {
                        on_closedown.borrow_mut().closedown();
                        Ok(())
                    },
                    || true,
                );
        }

        Self { inner, components }
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.inner = self.inner.with_dependencies(dependencies);
        self
    }

    /// Index of the component currently running, if any.
    pub fn current_component(&self) -> Option<usize> {
        let index = self.inner.current_phase() / 3;
        (index < self.components.len()).then_some(index)
    }
}

impl Test for CombinedTest {
    fn setup(&mut self) {
        self.inner.setup();
    }

    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        self.inner.periodic(cx)
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn closedown(&mut self) {
        // A component that failed mid-run was set up but never reached its closedown phase.
        let phase = self.inner.current_phase();
        if phase % 3 == 1 {
            if let Some(component) = self.components.get(phase / 3) {
                component.borrow_mut().closedown();
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dependencies(&self) -> &[TestId] {
        self.inner.dependencies()
    }

    fn dependency_requirements(&self) -> Vec<bool> {
        self.inner.dependency_requirements()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::link::scripted::ScriptedConsole;
    use crate::testing::clock::ManualClock;
    use crate::testing::{InstantTest, TestFault, check};

    fn noop() -> Action {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn test_multi_phase_rejects_mismatched_lengths() {
        let err = MultiPhaseTest::new("bad", vec![noop(), noop()], vec![Box::new(|| true)]).err();
        assert_eq!(err, Some(ConfigError::PhaseCountMismatch { phases: 2, conditions: 1 }));
    }

    #[test]
    fn test_multi_phase_done_after_last_condition() {
        // c1 becomes true on cycle 3, c2 on cycle 5
        let console = ScriptedConsole::new();
        let cycle = Rc::new(Cell::new(0u64));
        let (c1, c2) = (cycle.clone(), cycle.clone());
        let mut test = MultiPhaseTest::named("phases")
            .phase(|_| Ok(()), move || c1.get() >= 3)
            .phase(|_| Ok(()), move || c2.get() >= 5);
        test.setup();

        for n in 1..=5u64 {
            cycle.set(n);
            let mut cx = TestContext::new(n, &console);
            test.periodic(&mut cx).unwrap();
            if n < 5 {
                assert!(!test.is_done(), "done too early at cycle {}", n);
            }
        }
        assert!(test.is_done());
    }

    #[test]
    fn test_multi_phase_setup_resets_cursor() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let mut test = MultiPhaseTest::named("reset").phase(|_| Ok(()), || true);
        test.periodic(&mut cx).unwrap();
        assert!(test.is_done());
        test.setup();
        assert!(!test.is_done());
        assert_eq!(test.current_phase(), 0);
    }

    #[test]
    fn test_multi_phase_failure_keeps_phase() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let mut test = MultiPhaseTest::named("fails")
            .phase(|_| Ok(()), || true)
            .phase(|_| check::fail("Problem!"), || true);
        test.periodic(&mut cx).unwrap();
        let err = test.periodic(&mut cx).unwrap_err();
        assert_eq!(err, TestFault::Failure("Problem!".to_string()));
        assert_eq!(test.current_phase(), 1);
    }

    #[test]
    fn test_timed_phase_thresholds_are_cumulative() {
        let clock = ManualClock::new();
        let test = TimedPhaseTest::with_clock(
            "timed",
            vec![noop(), noop(), noop()],
            vec![Duration::from_millis(100), Duration::from_millis(50), Duration::from_millis(10)],
            clock,
        )
        .unwrap();
        assert_eq!(
            test.thresholds(),
            &[Duration::from_millis(100), Duration::from_millis(150), Duration::from_millis(160)]
        );
    }

    #[test]
    fn test_timed_phase_advances_with_clock() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(10));
        let mut test = TimedPhaseTest::with_clock(
            "timed",
            vec![noop(), noop()],
            vec![Duration::from_millis(40), Duration::from_millis(40)],
            clock.clone(),
        )
        .unwrap();

        // Timer starts at setup, not construction
        clock.advance(Duration::from_secs(5));
        test.setup();

        clock.advance(Duration::from_millis(20));
        test.periodic(&mut cx).unwrap();
        assert_eq!(test.current_phase(), 0);

        clock.advance(Duration::from_millis(20));
        test.periodic(&mut cx).unwrap();
        assert_eq!(test.current_phase(), 1);
        assert!(!test.is_done());

        clock.advance(Duration::from_millis(40));
        test.periodic(&mut cx).unwrap();
        assert!(test.is_done());
    }

    #[test]
    fn test_timed_phase_rejects_bad_input() {
        let clock = ManualClock::new();
        let err = TimedPhaseTest::with_clock("none", vec![], vec![], clock.clone()).err();
        assert_eq!(err, Some(ConfigError::NoPhases));
        let err = TimedPhaseTest::with_clock("short", vec![noop()], vec![Duration::ZERO; 2], clock).err();
        assert_eq!(err, Some(ConfigError::PhaseCountMismatch { phases: 1, conditions: 2 }));
    }

    /// Records lifecycle calls of a component.
    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        ticks_needed: u32,
        ticks: u32,
        fail: bool,
    }

    impl Test for Probe {
        fn setup(&mut self) {
            self.ticks = 0;
            self.log.borrow_mut().push(format!("{}:setup", self.name));
        }

        fn periodic(&mut self, _cx: &mut TestContext<'_>) -> TestResult {
            self.ticks += 1;
            self.log.borrow_mut().push(format!("{}:periodic", self.name));
            if self.fail {
                return check::fail("probe failed");
            }
            Ok(())
        }

        fn is_done(&self) -> bool {
            self.ticks >= self.ticks_needed
        }

        fn closedown(&mut self) {
            self.log.borrow_mut().push(format!("{}:closedown", self.name));
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn probe(name: &'static str, log: &Rc<RefCell<Vec<String>>>, ticks_needed: u32, fail: bool) -> Box<dyn Test> {
        Box::new(Probe {
            name,
            log: Rc::clone(log),
            ticks_needed,
            ticks: 0,
            fail,
        })
    }

    #[test]
    fn test_combined_flattens_into_three_phases_per_component() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut test = CombinedTest::new("combo", vec![probe("a", &log, 2, false), probe("b", &log, 1, false)]);
        test.setup();

        let mut ticks = 0;
        while !test.is_done() {
            test.periodic(&mut cx).unwrap();
            ticks += 1;
        }
        test.closedown();

        // a: setup, periodic x2, closedown; b: setup, periodic, closedown
        assert_eq!(ticks, 7);
        assert_eq!(
            *log.borrow(),
            vec![
                "a:setup",
                "a:periodic",
                "a:periodic",
                "a:closedown",
                "b:setup",
                "b:periodic",
                "b:closedown"
            ]
        );
        assert_eq!(test.current_component(), None);
    }

    #[test]
    fn test_combined_failure_closes_active_component() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut test = CombinedTest::new("combo", vec![probe("a", &log, 1, true), probe("b", &log, 1, false)]);
        test.setup();

        test.periodic(&mut cx).unwrap();
        assert!(test.periodic(&mut cx).is_err());
        assert_eq!(test.current_component(), Some(0));
        test.closedown();

        assert_eq!(*log.borrow(), vec!["a:setup", "a:periodic", "a:closedown"]);
    }

    #[test]
    fn test_combined_of_instants() {
        let console = ScriptedConsole::new();
        let mut cx = TestContext::new(0, &console);
        let components: Vec<Box<dyn Test>> = vec![
            Box::new(InstantTest::new("one", |_| Ok(()))),
            Box::new(InstantTest::new("two", |_| Ok(()))),
        ];
        let mut test = CombinedTest::new("instants", components);
        test.setup();
        for _ in 0..6 {
            assert!(!test.is_done());
            test.periodic(&mut cx).unwrap();
        }
        assert!(test.is_done());
        assert_eq!(test.name(), "instants");
    }
}
