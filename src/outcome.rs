//! Outcome classification and run summaries.
//!
//! [`classify`] turns the captured output of one finished invocation into an
//! [`Outcome`]. It searches the whole output for lifecycle markers instead of
//! reading fixed line positions, so setup logging and warnings printed ahead
//! of the test do not change the verdict.
//!
//! # Classification
//!
//! | Captured stdout | Outcome |
//! |-----------------|---------|
//! | empty | `Crashed` |
//! | last start marker with no completion marker after it | `Crashed` |
//! | contains a success marker | `Passed` |
//! | anything else | `Failed` |

use std::path::PathBuf;
use std::time::Duration;

use crate::executor::CapturedResult;
use crate::framework::{InvocationDescriptor, TestIdentifier};

/// Fixed textual patterns announcing test lifecycle events.
///
/// A line "announces" an event when, after stripping ANSI color codes and
/// leading whitespace, it starts with the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    /// A test started running.
    pub started: &'static str,

    /// A test finished and did not fail.
    pub succeeded: &'static [&'static str],

    /// A test finished with a failure.
    pub failed: &'static [&'static str],
}

impl Markers {
    fn announces(line: &str, marker: &str) -> bool {
        console::strip_ansi_codes(line)
            .trim_start()
            .starts_with(marker)
    }

    /// Whether `line` announces the start of a test.
    pub fn is_start(&self, line: &str) -> bool {
        Self::announces(line, self.started)
    }

    /// Whether `line` announces a successful completion.
    pub fn is_success(&self, line: &str) -> bool {
        self.succeeded.iter().any(|m| Self::announces(line, m))
    }

    /// Whether `line` announces a failed completion.
    pub fn is_failure(&self, line: &str) -> bool {
        self.failed.iter().any(|m| Self::announces(line, m))
    }

    /// Whether `line` announces any completion, successful or not.
    pub fn is_completion(&self, line: &str) -> bool {
        self.is_success(line) || self.is_failure(line)
    }
}

/// Verdict for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The test reported success.
    Passed,

    /// The test ran to completion without reporting success.
    Failed(String),

    /// The test process ended before reporting completion, or never ran.
    Crashed(String),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Passed`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// The failure or crash reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed(reason) | Outcome::Crashed(reason) => Some(reason),
        }
    }
}

/// Classifies a finished invocation.
///
/// # Example
///
/// ```
/// use gtest_fanout::executor::CapturedResult;
/// use gtest_fanout::framework::gtest::GTEST_MARKERS;
/// use gtest_fanout::outcome::{Outcome, classify};
///
/// let captured = CapturedResult::from_output(
///     "[ RUN      ] Math.Adds\n[       OK ] Math.Adds (0 ms)\n",
///     "",
/// );
/// assert_eq!(classify(&captured, &GTEST_MARKERS), Outcome::Passed);
/// ```
pub fn classify(captured: &CapturedResult, markers: &Markers) -> Outcome {
    let stdout = captured.stdout_lossy();
    let lines: Vec<&str> = stdout.lines().collect();

    if lines.iter().all(|line| line.trim().is_empty()) {
        return Outcome::Crashed(format!(
            "no output before exit ({})",
            captured.exit_description()
        ));
    }

    if let Some(start) = lines.iter().rposition(|line| markers.is_start(line))
        && !lines[start + 1..]
            .iter()
            .any(|line| markers.is_completion(line))
    {
        return Outcome::Crashed(format!(
            "terminated while running `{}` ({})",
            marker_subject(lines[start], markers.started),
            captured.exit_description()
        ));
    }

    if lines.iter().any(|line| markers.is_success(line)) {
        return Outcome::Passed;
    }

    let reason = lines
        .iter()
        .find(|line| markers.is_failure(line))
        .map(|line| console::strip_ansi_codes(line).trim().to_string())
        .unwrap_or_else(|| format!("no success marker ({})", captured.exit_description()));

    Outcome::Failed(reason)
}

/// Text following a marker on its line, e.g. the test name after `[ RUN ]`.
fn marker_subject(line: &str, marker: &str) -> String {
    let plain = console::strip_ansi_codes(line);
    let plain = plain.trim();
    plain.strip_prefix(marker).unwrap_or(plain).trim().to_string()
}

/// Outcome of one test, paired with the output that produced it.
///
/// The captured output travels with the verdict so failure reports can
/// reproduce it verbatim.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Binary the test belongs to.
    pub binary: PathBuf,

    /// The test that ran.
    pub test: TestIdentifier,

    /// The verdict.
    pub outcome: Outcome,

    /// What the process wrote.
    pub captured: CapturedResult,
}

impl TestResult {
    /// Pairs a descriptor with its outcome and captured output.
    pub fn new(task: &InvocationDescriptor, outcome: Outcome, captured: CapturedResult) -> Self {
        Self {
            binary: task.binary.clone(),
            test: task.test.clone(),
            outcome,
            captured,
        }
    }

    /// Label used in reports: `binary: Suite.Case`.
    pub fn label(&self) -> String {
        self.test.label_in(&self.binary)
    }
}

/// Aggregate counts over a complete run.
///
/// `passed + failed + crashed == total` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of tests executed.
    pub total: usize,

    /// Number of tests that passed.
    pub passed: usize,

    /// Number of tests that completed without a success marker.
    pub failed: usize,

    /// Number of tests that crashed or could not be launched.
    pub crashed: usize,

    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl RunSummary {
    /// Tallies a complete set of results.
    pub fn from_results(results: &[TestResult], duration: Duration) -> Self {
        let mut summary = Self {
            total: results.len(),
            duration,
            ..Default::default()
        };

        for result in results {
            match result.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed(_) => summary.failed += 1,
                Outcome::Crashed(_) => summary.crashed += 1,
            }
        }

        summary
    }

    /// Number of tests that did not pass.
    pub fn failed_or_crashed(&self) -> usize {
        self.failed + self.crashed
    }

    /// Returns `true` if every test passed.
    pub fn success(&self) -> bool {
        self.failed_or_crashed() == 0
    }
}
