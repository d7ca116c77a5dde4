//! Test framework traits and shared test types.
//!
//! A [`TestFramework`] knows how to talk to one family of test binaries. It
//! has three responsibilities:
//!
//! 1. **Discover**: ask a binary which tests it contains ([`TestFramework::discover`])
//! 2. **Run**: produce the command that runs exactly one of those tests
//!    ([`TestFramework::produce_test_execution_command`])
//! 3. **Describe**: name the output markers the classifier looks for
//!    ([`TestFramework::markers`])
//!
//! ```text
//!  discover(binary) ─────────► TestBinary { path, tests }
//!                                   │
//!                                   ▼ build_tasks(forwarded args)
//!                          Vec<InvocationDescriptor>
//!                                   │
//!                                   ▼ produce_test_execution_command
//!                                Command  ──► executor ──► outcome::classify
//! ```
//!
//! # Built-in Frameworks
//!
//! | Implementation | Discovery Method |
//! |----------------|------------------|
//! | [`gtest::GtestFramework`] | `<binary> --gtest_filter=<expr> --gtest_list_tests` |

pub mod gtest;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::Command;
use crate::outcome::Markers;

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;

/// Errors raised while discovering tests or preparing invocations.
///
/// All of these are fatal for a run: they happen before any test executes,
/// and a task list built from bad input cannot be trusted.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// The listing command could not be run or produced nothing usable.
    #[error("Failed to discover tests in {binary}: {message}")]
    DiscoveryFailed { binary: String, message: String },

    /// The listing named a test case before naming any suite.
    #[error("Malformed test listing from {binary}, line {line}: case `{content}` has no suite")]
    MalformedListing {
        binary: String,
        line: usize,
        content: String,
    },

    /// The forwarded argument string could not be split into tokens.
    #[error("Invalid test arguments `{args}`: {message}")]
    InvalidArguments { args: String, message: String },
}

/// Fully-qualified name of a single test case, `Suite.Case`.
///
/// # Example
///
/// ```
/// use gtest_fanout::framework::TestIdentifier;
///
/// let id = TestIdentifier::new("Math", "Adds");
/// assert_eq!(id.to_string(), "Math.Adds");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestIdentifier {
    /// Grouping component, without the trailing separator.
    pub suite: String,

    /// Case component.
    pub case: String,
}

impl TestIdentifier {
    /// Separator between suite and case.
    pub const SEPARATOR: char = '.';

    /// Creates an identifier from its two components.
    pub fn new(suite: impl Into<String>, case: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            case: case.into(),
        }
    }

    /// Label used in reports: `binary: Suite.Case`.
    pub fn label_in(&self, binary: &Path) -> String {
        format!("{}: {}", binary.display(), self)
    }
}

impl std::fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.suite, Self::SEPARATOR, self.case)
    }
}

/// An executable together with the tests it reported.
///
/// Created once per binary by [`TestFramework::discover`] and not modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestBinary {
    /// Path used to invoke the binary.
    pub path: PathBuf,

    /// Tests in listing order.
    pub tests: Vec<TestIdentifier>,
}

impl TestBinary {
    /// Creates a test binary record.
    pub fn new(path: impl Into<PathBuf>, tests: Vec<TestIdentifier>) -> Self {
        Self {
            path: path.into(),
            tests,
        }
    }
}

/// Everything needed to run one test case once.
///
/// Descriptors share no state; each is consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationDescriptor {
    /// Binary that contains the test.
    pub binary: PathBuf,

    /// The test to run.
    pub test: TestIdentifier,

    /// Extra arguments forwarded to the binary, one token each.
    pub args: Vec<String>,
}

impl InvocationDescriptor {
    /// Label used in reports: `binary: Suite.Case`.
    pub fn label(&self) -> String {
        self.test.label_in(&self.binary)
    }
}

/// Splits a forwarded argument string using POSIX shell quoting.
///
/// # Example
///
/// ```
/// use gtest_fanout::framework::split_test_args;
///
/// let args = split_test_args(r#"--gtest_repeat=2 --name="a b""#)?;
/// assert_eq!(args, vec!["--gtest_repeat=2", "--name=a b"]);
/// # Ok::<(), gtest_fanout::framework::FrameworkError>(())
/// ```
pub fn split_test_args(args: &str) -> FrameworkResult<Vec<String>> {
    shell_words::split(args).map_err(|e| FrameworkError::InvalidArguments {
        args: args.to_string(),
        message: e.to_string(),
    })
}

/// Trait for discovering tests and producing single-test invocations.
///
/// Frameworks must be `Send + Sync` so one instance can be shared by every
/// worker in the pool.
#[async_trait]
pub trait TestFramework: Send + Sync {
    /// Asks `binary` which tests it contains.
    ///
    /// # Errors
    ///
    /// Any error here aborts the run before a single test executes.
    async fn discover(&self, binary: &Path) -> FrameworkResult<TestBinary>;

    /// Produces the command that runs only `task.test`.
    fn produce_test_execution_command(&self, task: &InvocationDescriptor) -> Command;

    /// Output markers used to classify a finished invocation.
    fn markers(&self) -> &Markers;

    /// Expands a binary into one descriptor per test, in listing order.
    fn build_tasks(&self, binary: &TestBinary, args: &[String]) -> Vec<InvocationDescriptor> {
        binary
            .tests
            .iter()
            .map(|test| InvocationDescriptor {
                binary: binary.path.clone(),
                test: test.clone(),
                args: args.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display() {
        assert_eq!(TestIdentifier::new("Typed/0", "Works").to_string(), "Typed/0.Works");
    }

    #[test]
    fn test_split_test_args_empty() {
        assert!(split_test_args("").unwrap().is_empty());
        assert!(split_test_args("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_test_args_unbalanced_quote() {
        let err = split_test_args("--name=\"oops").unwrap_err();
        assert!(matches!(err, FrameworkError::InvalidArguments { .. }));
    }

    #[test]
    fn test_descriptor_label() {
        let task = InvocationDescriptor {
            binary: PathBuf::from("./math_test"),
            test: TestIdentifier::new("Math", "Adds"),
            args: Vec::new(),
        };
        assert_eq!(task.label(), "./math_test: Math.Adds");
    }
}
