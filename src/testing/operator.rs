//! A test that asks the operator to confirm something they can see.

use super::{Dependencies, Test, TestContext, TestFault, TestId, TestResult};
use crate::link::Pending;

/// Asks a yes/no question on the first cycle and passes if the operator picks the true option.
///
/// The question is asked without blocking; later cycles poll for the answer.
pub struct OperatorCheck {
    name: String,
    question: String,
    true_label: String,
    false_label: String,
    pending: Option<Pending<bool>>,
    confirmed: bool,
    dependencies: Dependencies,
}

impl OperatorCheck {
    pub fn new(name: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            question: question.into(),
            true_label: "Yes".to_string(),
            false_label: "No".to_string(),
            pending: None,
            confirmed: false,
            dependencies: Dependencies::none(),
        }
    }

    pub fn with_labels(mut self, true_label: impl Into<String>, false_label: impl Into<String>) -> Self {
        self.true_label = true_label.into();
        self.false_label = false_label.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl Test for OperatorCheck {
    fn setup(&mut self) {
        self.pending = None;
        self.confirmed = false;
    }

    fn periodic(&mut self, cx: &mut TestContext<'_>) -> TestResult {
        let Some(pending) = self.pending.as_mut() else {
            self.pending = Some(cx.ask_user(&self.question, &self.true_label, &self.false_label)?);
            return Ok(());
        };

        match pending.try_take() {
            None => Ok(()),
            Some(Ok(true)) => {
                self.confirmed = true;
                Ok(())
            }
            Some(Ok(false)) => Err(TestFault::failure(format!(
                "operator answered '{}' to: {}",
                self.false_label, self.question
            ))),
            Some(Err(err)) => Err(TestFault::failure(format!("no answer from the console: {err}"))),
        }
    }

    fn is_done(&self) -> bool {
        self.confirmed
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
