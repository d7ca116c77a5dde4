//! Test runner for executing a single invocation.
//!
//! The [`TestRunner`] is what each worker slot in the pool calls once per
//! task: produce the command, run it, classify what it printed, and report
//! the result. It never returns an error; anything that stops a test from
//! producing output becomes a [`Outcome::Crashed`] result instead, so one
//! broken binary cannot abort its siblings.

use std::time::Duration;

use tracing::{debug, warn};

use crate::executor;
use crate::framework::{InvocationDescriptor, TestFramework};
use crate::outcome::{Outcome, TestResult, classify};
use crate::report::Reporter;

/// Executes and classifies one task at a time.
///
/// # Type Parameters
///
/// - `D`: The framework type (implements [`TestFramework`])
/// - `R`: The reporter type (implements [`Reporter`])
pub struct TestRunner<'a, D, R> {
    framework: &'a D,
    reporter: &'a R,
    timeout: Option<Duration>,
}

impl<'a, D: TestFramework, R: Reporter> TestRunner<'a, D, R> {
    /// Creates a new test runner.
    ///
    /// # Arguments
    ///
    /// * `framework` - Produces commands and names the output markers
    /// * `reporter` - Receives each result as soon as it is classified
    /// * `timeout` - Optional limit for a single test process
    pub fn new(framework: &'a D, reporter: &'a R, timeout: Option<Duration>) -> Self {
        Self {
            framework,
            reporter,
            timeout,
        }
    }

    /// Runs one task to completion and reports its result.
    pub async fn run(&self, task: &InvocationDescriptor) -> TestResult {
        let cmd = self
            .framework
            .produce_test_execution_command(task)
            .maybe_timeout(self.timeout);

        debug!("Running {}", cmd);

        let (outcome, captured) = match executor::execute(&cmd).await {
            Ok(captured) => (classify(&captured, self.framework.markers()), captured),
            Err(e) => {
                warn!("{}: {}", task.label(), e);
                // A timed-out test keeps what it printed before being killed.
                (Outcome::Crashed(e.to_string()), e.into_captured())
            }
        };

        debug!(
            "{} finished in {:?}: {:?}",
            task.label(),
            captured.duration,
            outcome
        );

        let result = TestResult::new(task, outcome, captured);
        self.reporter.on_test_complete(&result);
        result
    }
}
