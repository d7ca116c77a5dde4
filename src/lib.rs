//! gtest-fanout: run Google Test binaries one test per process, in parallel.
//!
//! Each test case is discovered from its binary's listing and then executed
//! in its own child process, so a segfault in one test is reported as a
//! crash of that test instead of taking the rest of the suite down with it.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Framework**: Lists tests and builds per-test commands (Google Test)
//! - **Executor**: Runs one child process and captures its output
//! - **Outcome**: Classifies captured output as passed, failed, or crashed
//! - **Orchestrator**: Dispatches tasks across a bounded worker pool
//! - **Report**: Writes failure dumps and the summary without interleaving
//!
//! # Example
//!
//! ```no_run
//! use gtest_fanout::config::load_config;
//! use gtest_fanout::framework::gtest::GtestFramework;
//! use gtest_fanout::orchestrator::Orchestrator;
//! use gtest_fanout::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(std::path::Path::new("fanout.toml"))?;
//!     let framework = GtestFramework::new(config.gtest.clone());
//!     let reporter = ConsoleReporter::new(config.fanout.verbose);
//!
//!     let result = Orchestrator::new(config, framework, reporter).run().await?;
//!     std::process::exit(result.exit_code(false));
//! }
//! ```

pub mod config;
pub mod executor;
pub mod framework;
pub mod orchestrator;
pub mod outcome;
pub mod report;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use framework::{InvocationDescriptor, TestBinary, TestFramework, TestIdentifier};
pub use orchestrator::{Orchestrator, RunResult};
pub use outcome::{Outcome, RunSummary, TestResult};
pub use report::Reporter;
