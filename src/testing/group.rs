//! Test registration: the [`Suite`] arena and named [`TestGroup`]s.
//!
//! Tests are registered once, before any run, and referred to by [`TestId`] afterwards:
//!
//! ```rust,ignore
//! let mut suite = Suite::new();
//! let passing = suite.add(InstantTest::new("T1", |_| check::ensure_eq(2, 2)));
//! let group = suite
//!     .group("Drivetrain")
//!     .test(passing)
//!     .marked("encoders_zeroed", |_| check::approx_eq(encoder(), 0.0))
//!     .finish();
//! ```
//!
//! Marked tests are the explicit counterpart of annotated test methods: each one is wrapped into an
//! [`InstantTest`] and listed after the group's explicit tests.

use std::collections::HashSet;

use super::{ConfigError, GroupId, InstantTest, Test, TestContext, TestId, TestResult};

/// A named, ordered collection of tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGroup {
    name: String,
    tests: Vec<TestId>,
    marked: Vec<TestId>,
}

impl TestGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicitly listed tests, in order.
    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    /// Tests registered through [`GroupBuilder::marked`], in order.
    pub fn marked(&self) -> &[TestId] {
        &self.marked
    }

    /// Explicit tests followed by marked tests. A test listed more than once appears only at its
    /// first position.
    pub fn full_tests(&self) -> Vec<TestId> {
        let mut seen = HashSet::new();
        self.tests
            .iter()
            .chain(self.marked.iter())
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Arena owning every test and group of a run.
#[derive(Default)]
pub struct Suite {
    tests: Vec<Box<dyn Test>>,
    groups: Vec<TestGroup>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test and return its identity.
    pub fn add(&mut self, test: impl Test + 'static) -> TestId {
        self.add_boxed(Box::new(test))
    }

    pub fn add_boxed(&mut self, test: Box<dyn Test>) -> TestId {
        let id = TestId(self.tests.len());
        self.tests.push(test);
        id
    }

    /// Start building a group.
    pub fn group(&mut self, name: impl Into<String>) -> GroupBuilder<'_> {
        GroupBuilder {
            suite: self,
            group: TestGroup {
                name: name.into(),
                tests: Vec::new(),
                marked: Vec::new(),
            },
        }
    }

    pub fn test(&self, id: TestId) -> Result<&dyn Test, ConfigError> {
        self.tests
            .get(id.0)
            .map(|t| t.as_ref())
            .ok_or(ConfigError::UnknownTest(id))
    }

    pub fn test_mut(&mut self, id: TestId) -> Result<&mut (dyn Test + 'static), ConfigError> {
        self.tests
            .get_mut(id.0)
            .map(|t| t.as_mut())
            .ok_or(ConfigError::UnknownTest(id))
    }

    pub fn group_by_id(&self, id: GroupId) -> Result<&TestGroup, ConfigError> {
        self.groups.get(id.0).ok_or(ConfigError::UnknownGroup(id))
    }

    /// All groups, in registration order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &TestGroup)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Check that every id a test or group refers to exists, and that each test's requirement
    /// list matches its dependency list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for test in &self.tests {
            let dependencies = test.dependencies();
            let requirements = test.dependency_requirements();
            if dependencies.len() != requirements.len() {
                return Err(ConfigError::RequirementCountMismatch {
                    test: test.name().to_string(),
                    dependencies: dependencies.len(),
                    requirements: requirements.len(),
                });
            }
            if let Some(missing) = dependencies.iter().find(|id| id.0 >= self.tests.len()) {
                return Err(ConfigError::UnknownTest(*missing));
            }
        }
        for group in &self.groups {
            if let Some(missing) = group.full_tests().into_iter().find(|id| id.0 >= self.tests.len()) {
                return Err(ConfigError::UnknownTest(missing));
            }
        }
        Ok(())
    }
}

/// Builder returned by [`Suite::group`].
pub struct GroupBuilder<'a> {
    suite: &'a mut Suite,
    group: TestGroup,
}

impl GroupBuilder<'_> {
    /// List an already registered test.
    pub fn test(mut self, id: TestId) -> Self {
        self.group.tests.push(id);
        self
    }

    /// Register a test and list it.
    pub fn add(mut self, test: impl Test + 'static) -> Self {
        let id = self.suite.add(test);
        self.group.tests.push(id);
        self
    }

    /// Register a single-cycle test method under `name`.
    pub fn marked<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: FnMut(&mut TestContext<'_>) -> TestResult + 'static,
    {
        let id = self.suite.add(InstantTest::new(name, method));
        self.group.marked.push(id);
        self
    }

    /// Store the group in the suite.
    pub fn finish(self) -> GroupId {
        let id = GroupId(self.suite.groups.len());
        self.suite.groups.push(self.group);
        id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{Dependencies, check};

    #[test]
    fn test_full_tests_lists_marked_after_explicit() {
        let mut suite = Suite::new();
        let first = suite.add(InstantTest::new("first", |_| Ok(())));
        let group = suite
            .group("G")
            .marked("annotated", |_| check::ensure_eq(1 + 1, 2))
            .test(first)
            .add(InstantTest::new("second", |_| Ok(())))
            .finish();

        let group = suite.group_by_id(group).unwrap();
        let names: Vec<&str> = group
            .full_tests()
            .into_iter()
            .map(|id| suite.test(id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["first", "second", "annotated"]);
        assert_eq!(group.name(), "G");
    }

    #[test]
    fn test_full_tests_drops_repeated_listing() {
        let mut suite = Suite::new();
        let a = suite.add(InstantTest::new("a", |_| Ok(())));
        let b = suite.add(InstantTest::new("b", |_| Ok(())));
        let group = suite.group("G").test(a).test(b).test(a).finish();
        assert_eq!(suite.group_by_id(group).unwrap().full_tests(), vec![a, b]);
    }

    #[test]
    fn test_ids_are_dense_and_stable() {
        let mut suite = Suite::new();
        let a = suite.add(InstantTest::new("a", |_| Ok(())));
        let b = suite.add(InstantTest::new("b", |_| Ok(())));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(suite.test(b).unwrap().name(), "b");
        assert_eq!(suite.test_count(), 2);
    }

    #[test]
    fn test_unknown_ids_are_config_errors() {
        let suite = Suite::new();
        assert!(matches!(suite.test(TestId(3)), Err(ConfigError::UnknownTest(TestId(3)))));
        assert!(matches!(
            suite.group_by_id(GroupId(0)),
            Err(ConfigError::UnknownGroup(GroupId(0)))
        ));
    }

    #[test]
    fn test_validate_catches_dangling_dependency() {
        let mut suite = Suite::new();
        suite.add(InstantTest::new("dangling", |_| Ok(())).with_dependencies(Dependencies::all_succeed([TestId(9)])));
        assert_eq!(suite.validate(), Err(ConfigError::UnknownTest(TestId(9))));
    }

    struct Lopsided;

    impl Test for Lopsided {
        fn periodic(&mut self, _cx: &mut TestContext<'_>) -> TestResult {
            Ok(())
        }

        fn is_done(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "lopsided"
        }

        fn dependency_requirements(&self) -> Vec<bool> {
            vec![true]
        }
    }

    #[test]
    fn test_validate_catches_requirement_mismatch() {
        let mut suite = Suite::new();
        suite.add(Lopsided);
        assert!(matches!(
            suite.validate(),
            Err(ConfigError::RequirementCountMismatch {
                dependencies: 0,
                requirements: 1,
                ..
            })
        ));
    }
}
