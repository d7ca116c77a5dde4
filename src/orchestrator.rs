//! Test discovery, dispatch, and result collection.
//!
//! # Architecture
//!
//! ```text
//!   binaries ──► TestFramework::discover (once per binary, fatal on error)
//!                        │
//!                        ▼
//!                 Vec<TestBinary> ──► build_tasks ──► Vec<InvocationDescriptor>
//!                                                           │ (read-only queue)
//!                         ┌─────────────────┬───────────────┴─┐
//!                         ▼                 ▼                 ▼
//!                    worker slot 0     worker slot 1 ... worker slot C-1
//!                    TestRunner::run   (one child process at a time each)
//!                         │                 │                 │
//!                         └── Reporter::on_test_complete (SyncWriter lock)
//!                                           │
//!                                           ▼
//!                         RunSummary ──► Reporter::on_run_complete
//! ```
//!
//! Workers pull the next task index from a shared atomic cursor; the task
//! list itself is never mutated, so handing out work needs no lock. Results
//! arrive in completion order, not submission order.
//!
//! # Example
//!
//! ```no_run
//! use gtest_fanout::config::Config;
//! use gtest_fanout::framework::gtest::GtestFramework;
//! use gtest_fanout::orchestrator::Orchestrator;
//! use gtest_fanout::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.fanout.binaries = vec!["./math_test".into()];
//!     config.fanout.concurrency = 4;
//!
//!     let framework = GtestFramework::new(config.gtest.clone());
//!     let reporter = ConsoleReporter::new(false);
//!
//!     let orchestrator = Orchestrator::new(config, framework, reporter);
//!     let result = orchestrator.run().await?;
//!     println!("{} of {} passed", result.summary.passed, result.summary.total);
//!     Ok(())
//! }
//! ```

pub mod runner;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::{Config, resolve_binary_path};
use crate::framework::{
    FrameworkResult, InvocationDescriptor, TestBinary, TestFramework, split_test_args,
};
use crate::outcome::{RunSummary, TestResult};
use crate::report::Reporter;

pub use runner::TestRunner;

/// Aggregated results of an entire run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Counts over every executed test.
    pub summary: RunSummary,

    /// Individual results, in completion order.
    pub results: Vec<TestResult>,
}

impl RunResult {
    /// Process exit code for this run.
    ///
    /// A completed run exits 0 regardless of test failures unless
    /// `fail_on_failure` is set, in which case any failed or crashed test
    /// gives 1.
    pub fn exit_code(&self, fail_on_failure: bool) -> i32 {
        if fail_on_failure && !self.summary.success() {
            1
        } else {
            0
        }
    }
}

/// Number of worker slots for a run: `concurrency`, but never more than
/// there are tasks and never fewer than one.
///
/// # Example
///
/// ```
/// use gtest_fanout::orchestrator::worker_count;
///
/// assert_eq!(worker_count(8, 3), 3);
/// assert_eq!(worker_count(0, 3), 1);
/// assert_eq!(worker_count(4, 0), 1);
/// ```
pub fn worker_count(concurrency: usize, tasks: usize) -> usize {
    concurrency.min(tasks).max(1)
}

/// Coordinates a whole run.
///
/// # Type Parameters
///
/// - `D`: The test framework type
/// - `R`: The reporter type
pub struct Orchestrator<D, R> {
    config: Config,
    framework: D,
    reporter: R,
}

impl<D, R> Orchestrator<D, R>
where
    D: TestFramework,
    R: Reporter,
{
    /// Creates a new orchestrator with the given components.
    pub fn new(config: Config, framework: D, reporter: R) -> Self {
        Self {
            config,
            framework,
            reporter,
        }
    }

    /// Configured binaries, with `~` expanded and bare names anchored to the
    /// working directory.
    pub fn binaries(&self) -> Vec<PathBuf> {
        self.config
            .fanout
            .binaries
            .iter()
            .map(|binary| resolve_binary_path(binary))
            .collect()
    }

    /// Lists the tests of every binary, in order.
    ///
    /// Stops at the first binary that cannot be listed.
    pub async fn discover(&self, binaries: &[PathBuf]) -> FrameworkResult<Vec<TestBinary>> {
        let mut discovered = Vec::with_capacity(binaries.len());
        for binary in binaries {
            let tests = self.framework.discover(binary).await?;
            info!(
                "Discovered {} tests in {}",
                tests.tests.len(),
                binary.display()
            );
            discovered.push(tests);
        }
        Ok(discovered)
    }

    /// Expands discovered binaries into one task per test.
    pub fn build_tasks(
        &self,
        binaries: &[TestBinary],
        args: &[String],
    ) -> Vec<InvocationDescriptor> {
        binaries
            .iter()
            .flat_map(|binary| self.framework.build_tasks(binary, args))
            .collect()
    }

    /// Discovers, runs, and summarizes every configured binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the forwarded arguments cannot be parsed or any
    /// binary cannot be listed. Nothing has run when that happens. Test
    /// failures are not errors.
    pub async fn run(&self) -> anyhow::Result<RunResult> {
        let args = split_test_args(&self.config.gtest.test_args)?;

        let binaries = self
            .discover(&self.binaries())
            .await
            .context("Test discovery failed; no tests were run")?;
        self.reporter.on_discovery_complete(&binaries);

        let tasks = self.build_tasks(&binaries, &args);
        Ok(self.run_tasks(&tasks).await)
    }

    /// Runs every task on a bounded pool and reports the summary.
    ///
    /// Must be called from a multi-threaded Tokio runtime: worker slots are
    /// scoped tasks that run in parallel on the runtime's threads.
    pub async fn run_tasks(&self, tasks: &[InvocationDescriptor]) -> RunResult {
        let start = Instant::now();
        let workers = worker_count(self.config.fanout.concurrency, tasks.len());

        info!(
            "Running {} tests with {} parallel workers",
            tasks.len(),
            workers
        );

        let runner = TestRunner::new(
            &self.framework,
            &self.reporter,
            self.config.fanout.test_timeout(),
        );
        let next = AtomicUsize::new(0);
        let collected = Mutex::new(Vec::with_capacity(tasks.len()));

        if !tasks.is_empty() {
            tokio_scoped::scope(|scope| {
                for slot in 0..workers {
                    let runner = &runner;
                    let next = &next;
                    let collected = &collected;

                    scope.spawn(async move {
                        while let Some(task) = tasks.get(next.fetch_add(1, Ordering::Relaxed)) {
                            debug!("Worker {} picked up {}", slot, task.label());
                            let result = runner.run(task).await;
                            collected
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(result);
                        }
                        debug!("Worker {} finished", slot);
                    });
                }
            });
        }

        let results = collected
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let summary = RunSummary::from_results(&results, start.elapsed());

        info!(
            "Run complete: {} passed, {} failed, {} crashed",
            summary.passed, summary.failed, summary.crashed
        );

        self.reporter.on_run_complete(&summary, &results);

        RunResult { summary, results }
    }
}
