//! Terminal rendering of a results table.

use std::fmt::Write as _;

use crate::results::{Outcome, ResultsTable};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn status(outcome: Outcome) -> (&'static str, &'static str) {
    match outcome {
        Outcome::Success => (GREEN, "PASSED"),
        Outcome::Fail => (RED, "FAILED"),
        Outcome::NotRun => (YELLOW, "NOT RUN"),
    }
}

/// Render results grouped by test group, with a summary line.
pub fn render_results(results: &ResultsTable, color: bool) -> String {
    let palette = Palette { enabled: color };
    let mut out = String::new();

    let _ = writeln!(out, "{}", palette.paint(BOLD, "=================== test results ==================="));
    for group in results.groups() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", palette.paint(BOLD, &group.name));
        if group.tests.is_empty() {
            let _ = writeln!(out, "  (no tests run)");
        }
        for (test, report) in &group.tests {
            let (code, label) = status(report.outcome);
            let _ = writeln!(out, "  {} {}", palette.paint(code, &format!("{label:<7}")), test);
            if !report.message.is_empty() {
                let _ = writeln!(out, "          {}", report.message);
            }
        }
    }

    let summary = results.summary();
    let line = format!("=================== {summary} ===================");
    let code = if summary.failed > 0 { BOLD_RED } else { BOLD_GREEN };
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", palette.paint(code, &line));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TestReport;

    #[test]
    fn test_render_plain() {
        let mut table = ResultsTable::new();
        table.record("Example Test Group", "Example Failing Test", TestReport::new(Outcome::Fail, "4 was not equal to 7"));
        table.record("Example Test Group", "Example Test", TestReport::success());
        table.record(
            "Example Test Group",
            "Example Dependent Test",
            TestReport::new(Outcome::NotRun, "Dependencies Not Correct"),
        );
        table.group_mut("Test Subsystem");

        insta::assert_snapshot!(render_results(&table, false), @r"
        =================== test results ===================

        Example Test Group
          FAILED  Example Failing Test
                  4 was not equal to 7
          PASSED  Example Test
          NOT RUN Example Dependent Test
                  Dependencies Not Correct

        Test Subsystem
          (no tests run)

        =================== 1 passed, 1 failed, 1 not run ===================
        ");
    }

    #[test]
    fn test_render_colored_marks_status() {
        let mut table = ResultsTable::new();
        table.record("G", "ok", TestReport::success());
        let rendered = render_results(&table, true);
        assert!(rendered.contains("\x1b[32mPASSED \x1b[0m ok"));
        assert!(rendered.contains("\x1b[1;32m"));
    }
}
