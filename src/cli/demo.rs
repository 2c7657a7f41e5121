//! Bundled demo suite for `fieldtest run`.
//!
//! Exercises every test variant against a simulated mechanism, including tests that fail and tests
//! skipped for their dependencies, so a console shows every kind of result.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::testing::instant::Action;
use crate::testing::{
    CombinedTest, ConfigError, Dependencies, GroupId, InstantTest, MultiPhaseTest, OnePhaseTest, OperatorCheck,
    Suite, Test, TestContext, TestResult, TimedPhaseTest, check,
};

/// A stand-in for a real mechanism: one position that the tests drive.
#[derive(Debug, Clone, Default)]
pub struct SimulatedArm {
    position: Rc<Cell<f64>>,
}

impl SimulatedArm {
    pub fn position(&self) -> f64 {
        self.position.get()
    }

    pub fn set(&self, position: f64) {
        self.position.set(position);
    }

    pub fn step(&self, by: f64) {
        self.position.set(self.position.get() + by);
    }
}

fn idle() -> Action {
    Box::new(|_| Ok(()))
}

/// Counts cycles since setup and checks the arm tracks the count.
struct TrackingTest {
    arm: SimulatedArm,
    cycles: u32,
}

impl Test for TrackingTest {
    fn setup(&mut self) {
        self.arm.set(0.0);
        self.cycles = 0;
    }

    fn periodic(&mut self, _cx: &mut TestContext<'_>) -> TestResult {
        self.cycles += 1;
        self.arm.step(1.0);
        check::approx_eq(self.arm.position(), f64::from(self.cycles))
    }

    fn is_done(&self) -> bool {
        self.cycles == 10
    }

    fn closedown(&mut self) {
        self.arm.set(0.0);
    }

    fn name(&self) -> &str {
        "Arm Tracks Cycle Count"
    }
}

/// Register the demo groups, in the order they should be offered to the operator.
pub fn build_suite() -> Result<(Suite, Vec<GroupId>), ConfigError> {
    let mut suite = Suite::new();
    let arm = SimulatedArm::default();

    // Dependency showcase: one failure cascades into two not-run tests.
    let baseline = suite.add(InstantTest::new("Example Test", |_| Ok(())));
    let failing = suite.add(InstantTest::new("Example Failing Test", |_| check::ensure_eq(2 + 2, 7)));
    let dependent = suite.add(
        InstantTest::new("Example Dependent Test", |_| Ok(()))
            .with_dependencies(Dependencies::all_succeed([baseline, failing])),
    );
    let super_dependent = suite.add(
        InstantTest::new("Example Super Dependent Test", |_| Ok(()))
            .with_dependencies(Dependencies::all_succeed([dependent])),
    );
    let expects_failure = suite.add(
        InstantTest::new("Example Inverted Dependency Test", |_| Ok(()))
            .with_dependencies(Dependencies::from_pairs([(baseline, true), (failing, false)])),
    );
    let examples = suite
        .group("Example Test Group")
        .test(failing)
        .test(super_dependent)
        .test(expects_failure)
        .finish();

    // Variants against the simulated arm.
    let tracking = suite.add(TrackingTest {
        arm: arm.clone(),
        cycles: 0,
    });

    let seek_arm = arm.clone();
    let settled_arm = arm.clone();
    let one_phase = OnePhaseTest::new(
        "Example One Phase Test",
        move |_| {
            seek_arm.step(0.5);
            Ok(())
        },
        move || settled_arm.position() >= 3.0,
    );

    let raise_arm = arm.clone();
    let raised_arm = arm.clone();
    let lower_arm = arm.clone();
    let multiphase = MultiPhaseTest::named("Multiphase Test")
        .phase(
            move |_| {
                raise_arm.step(1.0);
                Ok(())
            },
            move || raised_arm.position() >= 9.0,
        )
        .phase(
            move |_| {
                lower_arm.step(-2.0);
                check::fail("Problem!")
            },
            || true,
        );

    let spin_up = TimedPhaseTest::new(
        "Spin Up",
        vec![idle(), idle()],
        vec![Duration::from_millis(100), Duration::from_millis(200)],
    )?;

    let home_arm = arm.clone();
    let homing = InstantTest::new("Home Arm", move |_| {
        home_arm.set(0.0);
        Ok(())
    });
    let homed_arm = arm.clone();
    let verify = InstantTest::new("Verify Home", move |_| check::approx_eq(homed_arm.position(), 0.0));
    let sequence = CombinedTest::new("Home Then Verify", vec![Box::new(homing), Box::new(verify)]);

    let simulated = suite
        .group("Test Subsystem")
        .test(tracking)
        .add(InstantTest::new("exampleTest2", |_| check::ensure_eq(1 + 1, 2)))
        .add(one_phase)
        .add(multiphase)
        .add(spin_up)
        .add(sequence)
        .marked("exampleAnnotationTestNamed", |_| check::ensure_eq(1 + 1 + 1, 2))
        .marked("exampleAnnotationTestUnnamed", |_| check::ensure_eq(1 + 1, 2))
        .finish();

    let operator = suite
        .group("Operator Checks")
        .add(
            OperatorCheck::new("Status Light", "Is the status light on?")
                .with_dependencies(Dependencies::all_succeed([tracking])),
        )
        .finish();

    suite.validate()?;
    Ok((suite, vec![examples, simulated, operator]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::link::ScriptedConsole;
    use crate::results::Outcome;
    use crate::scheduler::{Scheduler, SchedulerConfig};

    #[test]
    fn test_demo_suite_registers_three_groups() {
        let (suite, groups) = build_suite().unwrap();
        let names: Vec<&str> = groups
            .iter()
            .map(|&id| suite.group_by_id(id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["Example Test Group", "Test Subsystem", "Operator Checks"]);
    }

    #[test]
    fn test_demo_example_group_outcomes() {
        let (suite, groups) = build_suite().unwrap();
        let console = ScriptedConsole::new();
        console.reply_selection("TFF");
        let mut scheduler = Scheduler::new(suite, console, SchedulerConfig::default().with_warmup_ticks(0));
        for &group in &groups {
            scheduler.queue_group(group).unwrap();
        }
        for _ in 0..50 {
            scheduler.tick().unwrap();
        }
        assert!(scheduler.is_finished());

        let results = scheduler.results();
        let outcome = |test: &str| results.get("Example Test Group", test).unwrap().outcome;
        assert_eq!(outcome("Example Failing Test"), Outcome::Fail);
        assert_eq!(outcome("Example Test"), Outcome::Success);
        assert_eq!(outcome("Example Dependent Test"), Outcome::NotRun);
        assert_eq!(outcome("Example Super Dependent Test"), Outcome::NotRun);
        assert_eq!(outcome("Example Inverted Dependency Test"), Outcome::Success);
    }
}
