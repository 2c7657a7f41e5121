//! Property-based tests for fieldtest
//!
//! These tests use proptest to check scheduler and protocol invariants across randomly generated
//! suites and results tables.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fieldtest::link::ScriptedConsole;
use fieldtest::link::protocol::{ControllerMessage, MessageDecoder, encode_results, encode_selection_response, single_line};
use fieldtest::results::{Outcome, ResultsTable, TestReport};
use fieldtest::scheduler::{Scheduler, SchedulerConfig};
use fieldtest::testing::{Dependencies, GroupId, InstantTest, Suite, TestId, check};
use proptest::prelude::*;

const GROUPS: usize = 3;

fn no_warmup() -> SchedulerConfig {
    SchedulerConfig::default().with_warmup_ticks(0)
}

// =============================================================================
// Scheduling Properties
// =============================================================================

#[cfg(test)]
mod scheduling_tests {
    use super::*;

    /// One generated test: whether its body passes, its group, and its dependencies on earlier tests.
    #[derive(Debug, Clone)]
    struct Node {
        passes: bool,
        group: usize,
        dependencies: BTreeMap<usize, bool>,
    }

    fn node_strategy(index: usize) -> BoxedStrategy<Node> {
        let dependencies = if index == 0 {
            Just(BTreeMap::new()).boxed()
        } else {
            proptest::collection::btree_map(0..index, any::<bool>(), 0..=index.min(3)).boxed()
        };
        (any::<bool>(), 0..GROUPS, dependencies)
            .prop_map(|(passes, group, dependencies)| Node {
                passes,
                group,
                dependencies,
            })
            .boxed()
    }

    /// Dependencies only point backwards, so every generated suite is acyclic.
    fn dag_strategy() -> impl Strategy<Value = Vec<Node>> {
        (1usize..9).prop_flat_map(|n| (0..n).map(node_strategy).collect::<Vec<_>>())
    }

    struct Run {
        scheduler: Scheduler<ScriptedConsole>,
        ids: Vec<TestId>,
        order: Vec<usize>,
    }

    fn run(nodes: &[Node]) -> Run {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut suite = Suite::new();
        let mut ids: Vec<TestId> = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            let dependencies = Dependencies::from_pairs(node.dependencies.iter().map(|(&d, &must)| (ids[d], must)));
            let log = Rc::clone(&order);
            let passes = node.passes;
            let test = InstantTest::new(format!("t{index}"), move |_| {
                log.borrow_mut().push(index);
                check::ensure(passes, "told to fail")
            })
            .with_dependencies(dependencies);
            ids.push(suite.add(test));
        }

        let groups: Vec<GroupId> = (0..GROUPS)
            .map(|g| {
                let mut builder = suite.group(format!("group {g}"));
                for (index, node) in nodes.iter().enumerate() {
                    if node.group == g {
                        builder = builder.test(ids[index]);
                    }
                }
                builder.finish()
            })
            .collect();

        let mut scheduler = Scheduler::new(suite, ScriptedConsole::unattended(), no_warmup());
        scheduler.init();
        for group in groups {
            scheduler.queue_group(group).unwrap();
        }
        for _ in 0..1_000 {
            scheduler.tick().unwrap();
            if scheduler.is_finished() && !scheduler.publication_pending() {
                break;
            }
        }
        assert!(scheduler.is_finished(), "run did not finish");

        let order = order.borrow().clone();
        Run { scheduler, ids, order }
    }

    proptest! {
        /// Property: Every test in an acyclic suite is recorded exactly once, and its outcome
        /// follows from its body and its dependencies' outcomes
        #[test]
        fn every_test_gets_one_consistent_outcome(nodes in dag_strategy()) {
            let Run { scheduler, ids, order } = run(&nodes);

            prop_assert_eq!(scheduler.results().summary().total(), nodes.len());
            prop_assert_eq!(scheduler.console().published().len(), 1);

            for (index, node) in nodes.iter().enumerate() {
                let outcome = scheduler.outcome(ids[index]);
                prop_assert!(outcome.is_some(), "t{} has no outcome", index);

                let correct = node
                    .dependencies
                    .iter()
                    .all(|(&d, &must)| scheduler.outcome(ids[d]).is_some_and(|o| o.satisfies(must)));
                let expected = match (correct, node.passes) {
                    (false, _) => Outcome::NotRun,
                    (true, true) => Outcome::Success,
                    (true, false) => Outcome::Fail,
                };
                prop_assert_eq!(outcome, Some(expected), "t{}", index);
            }

            let mut seen = order.clone();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), order.len(), "a body ran twice");
        }

        /// Property: A test body only runs after the bodies of all its dependencies
        #[test]
        fn dependencies_run_first(nodes in dag_strategy()) {
            let Run { order, .. } = run(&nodes);
            let position = |index: usize| order.iter().position(|&ran| ran == index);

            for &ran in &order {
                let at = position(ran);
                for &dependency in nodes[ran].dependencies.keys() {
                    let before = position(dependency);
                    prop_assert!(before.is_some() && before < at, "t{} ran before its dependency t{}", ran, dependency);
                }
            }
        }

        /// Property: Applying a selection keeps exactly the selected groups, in their original order
        #[test]
        fn selection_keeps_flagged_groups_in_order(flags in proptest::collection::vec(any::<bool>(), 0..12)) {
            let mut suite = Suite::new();
            let groups: Vec<GroupId> = (0..flags.len()).map(|g| suite.group(format!("G{g}")).finish()).collect();

            let console = ScriptedConsole::new();
            console.reply_selection(&encode_selection_response(&flags));
            let mut scheduler = Scheduler::new(suite, console, no_warmup());
            scheduler.init();
            for &group in &groups {
                scheduler.queue_group(group).unwrap();
            }
            scheduler.tick().unwrap();
            scheduler.tick().unwrap();

            let kept: Vec<GroupId> = groups
                .iter()
                .zip(&flags)
                .filter(|(_, keep)| **keep)
                .map(|(&group, _)| group)
                .collect();
            prop_assert_eq!(scheduler.queued_groups(), kept);
        }
    }
}

// =============================================================================
// Protocol Properties
// =============================================================================

#[cfg(test)]
mod protocol_tests {
    use super::*;

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![Just(Outcome::Success), Just(Outcome::Fail), Just(Outcome::NotRun)]
    }

    /// Groups of (test name, outcome, message); messages may contain line breaks.
    fn rows_strategy() -> impl Strategy<Value = Vec<(String, Vec<(String, Outcome, String)>)>> {
        let test = ("[A-Za-z][ -~]{0,15}", outcome_strategy(), "[ -~\n]{0,24}");
        proptest::collection::vec(
            ("[A-Za-z][A-Za-z0-9 _-]{0,15}", proptest::collection::vec(test, 0..5)),
            0..4,
        )
    }

    fn table(rows: &[(String, Vec<(String, Outcome, String)>)], flatten: bool) -> ResultsTable {
        let mut table = ResultsTable::new();
        for (group, tests) in rows {
            table.group_mut(group);
            for (name, outcome, message) in tests {
                let message = if flatten {
                    single_line(message).into_owned()
                } else {
                    message.clone()
                };
                table.record(group, name, TestReport::new(*outcome, message));
            }
        }
        table
    }

    proptest! {
        /// Property: The console decoder rebuilds exactly the published table, completing only on
        /// the last line, with line breaks in messages flattened to spaces
        #[test]
        fn decoder_rebuilds_published_table(rows in rows_strategy()) {
            let wire = encode_results(&table(&rows, false));
            let lines: Vec<&str> = wire.lines().collect();

            let mut decoder = MessageDecoder::new();
            let mut decoded = None;
            for (at, line) in lines.iter().enumerate() {
                let message = decoder.push_line(line).unwrap();
                prop_assert_eq!(message.is_some(), at + 1 == lines.len(), "line {}: {:?}", at, line);
                decoded = message;
            }

            prop_assert!(decoder.is_idle());
            prop_assert_eq!(decoded, Some(ControllerMessage::Results(table(&rows, true))));
        }
    }
}
