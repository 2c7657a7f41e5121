//! Test outcomes and the per-group results table published to the console.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;

/// Terminal classification of a test in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    NotRun,
    Fail,
    Success,
}

impl Outcome {
    /// One-letter wire prefix (`S`, `F` or `N`).
    pub fn code(self) -> char {
        match self {
            Outcome::Success => 'S',
            Outcome::Fail => 'F',
            Outcome::NotRun => 'N',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'S' => Some(Outcome::Success),
            'F' => Some(Outcome::Fail),
            'N' => Some(Outcome::NotRun),
            _ => None,
        }
    }

    /// Whether this outcome satisfies a dependency requirement.
    ///
    /// `NotRun` satisfies neither polarity.
    pub fn satisfies(self, must_succeed: bool) -> bool {
        match self {
            Outcome::Success => must_succeed,
            Outcome::Fail => !must_succeed,
            Outcome::NotRun => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Fail => "FAIL",
            Outcome::NotRun => "NOT RUN",
        };
        f.write_str(label)
    }
}

/// Outcome of one test plus its diagnostic message (empty unless there is something to say).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub outcome: Outcome,
    pub message: String,
}

impl TestReport {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(Outcome::Success, "")
    }
}

/// Reports for the tests of one group, in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupResults {
    pub name: String,
    pub tests: Vec<(String, TestReport)>,
}

impl GroupResults {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Record a report, replacing any earlier report under the same test name.
    pub fn record(&mut self, test: &str, report: TestReport) {
        match self.tests.iter_mut().find(|(name, _)| name == test) {
            Some((_, existing)) => *existing = report,
            None => self.tests.push((test.to_string(), report)),
        }
    }

    pub fn get(&self, test: &str) -> Option<&TestReport> {
        self.tests.iter().find(|(name, _)| name == test).map(|(_, r)| r)
    }
}

/// Results of a run: group name to test name to report, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsTable {
    groups: Vec<GroupResults>,
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub not_run: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.not_run
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} not run",
            self.passed, self.failed, self.not_run
        )
    }
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `group`, created empty if absent.
    pub fn group_mut(&mut self, group: &str) -> &mut GroupResults {
        let index = match self.groups.iter().position(|g| g.name == group) {
            Some(index) => index,
            None => {
                self.groups.push(GroupResults::new(group));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    pub fn record(&mut self, group: &str, test: &str, report: TestReport) {
        self.group_mut(group).record(test, report);
    }

    pub fn group(&self, group: &str) -> Option<&GroupResults> {
        self.groups.iter().find(|g| g.name == group)
    }

    pub fn get(&self, group: &str, test: &str) -> Option<&TestReport> {
        self.group(group).and_then(|g| g.get(test))
    }

    pub fn groups(&self) -> &[GroupResults] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for (_, report) in self.groups.iter().flat_map(|g| g.tests.iter()) {
            match report.outcome {
                Outcome::Success => summary.passed += 1,
                Outcome::Fail => summary.failed += 1,
                Outcome::NotRun => summary.not_run += 1,
            }
        }
        summary
    }
}
