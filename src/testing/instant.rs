//! Single-action tests built from closures.

use super::{Dependencies, Test, TestContext, TestId, TestResult};

/// A test body step: one call per cycle.
pub type Action = Box<dyn FnMut(&mut TestContext<'_>) -> TestResult>;

/// A completion predicate.
pub type Condition = Box<dyn Fn() -> bool>;

/// A test that runs once and ends immediately.
pub struct InstantTest {
    name: String,
    action: Action,
    dependencies: Dependencies,
}

impl InstantTest {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnMut(&mut TestContext<'_>) -> TestResult + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
            dependencies: Dependencies::none(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl Test for InstantTest {
    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        (self.action)(cx)
    }

    fn is_done(&self) -> bool {
        true
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

/// A test that repeats one action until a predicate holds.
pub struct OnePhaseTest {
    name: String,
    action: Action,
    done: Condition,
    dependencies: Dependencies,
}

impl OnePhaseTest {
    pub fn new<F, D>(name: impl Into<String>, action: F, done: D) -> Self
    where
        F: FnMut(&mut TestContext<'_>) -> TestResult + 'static,
        D: Fn() -> bool + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
            done: Box::new(done),
            dependencies: Dependencies::none(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl Test for OnePhaseTest {
    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        (self.action)(cx)
    }

    fn is_done(&self) -> bool {
        (self.done)()
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
