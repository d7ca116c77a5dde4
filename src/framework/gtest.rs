//! Google Test framework implementation.
//!
//! Discovery runs the binary in listing mode and parses the suite/case
//! outline it prints. Each discovered case is then run in its own process
//! with a single-test filter.
//!
//! # Listing Format
//!
//! ```text
//! Running main() from gtest_main.cc      <- optional header
//! Math.
//!   Adds
//!   Divides
//! Typed/0.  # TypeParam = int
//!   Works
//!
//! ```
//!
//! A line ending in `.` opens a suite; every other non-empty line is a case
//! in the most recent suite. Trailing `# ...` comments (typed and
//! value-parameterized tests) are ignored.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    FrameworkError, FrameworkResult, InvocationDescriptor, TestBinary, TestFramework,
    TestIdentifier,
};
use crate::config::GtestConfig;
use crate::executor::{self, Command};
use crate::outcome::Markers;

/// Lifecycle markers printed by Google Test's default result printer.
pub const GTEST_MARKERS: Markers = Markers {
    started: "[ RUN      ]",
    succeeded: &["[       OK ]", "[  SKIPPED ]"],
    failed: &["[  FAILED  ]"],
};

/// Test framework for Google Test binaries.
pub struct GtestFramework {
    config: GtestConfig,
}

impl GtestFramework {
    /// Creates a new Google Test framework with the given configuration.
    pub fn new(config: GtestConfig) -> Self {
        Self { config }
    }

    /// The command that lists tests matching the configured filter.
    pub fn listing_command(&self, binary: &Path) -> Command {
        Command::new(binary)
            .arg(format!("--gtest_filter={}", self.config.filter))
            .arg("--gtest_list_tests")
    }
}

/// Parses `--gtest_list_tests` output into test identifiers, in order.
///
/// The first line is treated as a header and skipped unless it already
/// names a suite. Blank lines are ignored.
///
/// # Errors
///
/// [`FrameworkError::MalformedListing`] if a case appears before any suite.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use gtest_fanout::framework::gtest::parse_listing;
///
/// let tests = parse_listing(Path::new("./t"), "Suite1.\n  CaseA\n  CaseB\nSuite2.\n  CaseC\n")?;
/// let names: Vec<String> = tests.iter().map(|t| t.to_string()).collect();
/// assert_eq!(names, ["Suite1.CaseA", "Suite1.CaseB", "Suite2.CaseC"]);
/// # Ok::<(), gtest_fanout::framework::FrameworkError>(())
/// ```
pub fn parse_listing(binary: &Path, output: &str) -> FrameworkResult<Vec<TestIdentifier>> {
    let mut tests = Vec::new();
    let mut suite: Option<&str> = None;

    for (index, raw) in output.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_suffix(TestIdentifier::SEPARATOR) {
            suite = Some(name);
            continue;
        }

        match suite {
            Some(name) => tests.push(TestIdentifier::new(name, line)),
            None if index == 0 => debug!("Skipping listing header: {}", line),
            None => {
                return Err(FrameworkError::MalformedListing {
                    binary: binary.display().to_string(),
                    line: index + 1,
                    content: line.to_string(),
                });
            }
        }
    }

    Ok(tests)
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(head, _)| head)
}

#[async_trait]
impl TestFramework for GtestFramework {
    async fn discover(&self, binary: &Path) -> FrameworkResult<TestBinary> {
        let cmd = self.listing_command(binary);
        debug!("Listing tests: {}", cmd);

        let discovery_failed = |message: String| FrameworkError::DiscoveryFailed {
            binary: binary.display().to_string(),
            message,
        };

        let output = executor::execute(&cmd)
            .await
            .map_err(|e| discovery_failed(e.to_string()))?;

        let stdout = output.stdout_lossy();
        if !output.success() {
            if stdout.trim().is_empty() {
                return Err(discovery_failed(format!(
                    "listing exited with {} and printed nothing: {}",
                    output.exit_description(),
                    output.stderr_lossy().trim()
                )));
            }
            warn!(
                "Listing {} exited with {}; parsing its output anyway",
                binary.display(),
                output.exit_description()
            );
        }

        let tests = parse_listing(binary, &stdout)?;

        if tests.is_empty() {
            warn!(
                "No tests in {} match filter `{}`",
                binary.display(),
                self.config.filter
            );
        }

        Ok(TestBinary::new(binary, tests))
    }

    fn produce_test_execution_command(&self, task: &InvocationDescriptor) -> Command {
        Command::new(&task.binary)
            .arg(format!("--gtest_filter={}", task.test))
            .args(task.args.iter().cloned())
    }

    fn markers(&self) -> &Markers {
        &GTEST_MARKERS
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn parse(output: &str) -> FrameworkResult<Vec<String>> {
        parse_listing(Path::new("./t"), output)
            .map(|tests| tests.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_parse_listing_without_header() {
        let tests = parse("Suite1.\n  CaseA\n  CaseB\nSuite2.\n  CaseC\n").unwrap();
        assert_eq!(tests, ["Suite1.CaseA", "Suite1.CaseB", "Suite2.CaseC"]);
    }

    #[test]
    fn test_parse_listing_with_header() {
        let output = "Running main() from gtest_main.cc\nMath.\n  Adds\n  Divides\n\n";
        assert_eq!(parse(output).unwrap(), ["Math.Adds", "Math.Divides"]);
    }

    #[test]
    fn test_parse_listing_header_only() {
        assert!(parse("Running main() from gtest_main.cc\n\n").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_typed_and_parameterized() {
        let output = "\
Typed/0.  # TypeParam = int
  Works
Inst/Param.
  Holds/0  # GetParam() = 1
  Holds/1  # GetParam() = 2
";
        assert_eq!(
            parse(output).unwrap(),
            ["Typed/0.Works", "Inst/Param.Holds/0", "Inst/Param.Holds/1"]
        );
    }

    #[test]
    fn test_parse_listing_case_before_suite() {
        let err = parse("Running main()\n  Orphan\nSuite.\n  Case\n").unwrap_err();
        match err {
            FrameworkError::MalformedListing { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "Orphan");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_listing_trims_whitespace() {
        let output = "header\r\n  Net.  \r\n\tConnects\r\n";
        assert_eq!(parse(output).unwrap(), ["Net.Connects"]);
    }

    #[test]
    fn test_listing_command() {
        let framework = GtestFramework::new(GtestConfig {
            filter: "Math.*".to_string(),
            ..Default::default()
        });
        let cmd = framework.listing_command(Path::new("./math_test"));
        assert_eq!(cmd.program, PathBuf::from("./math_test"));
        assert_eq!(cmd.args, ["--gtest_filter=Math.*", "--gtest_list_tests"]);
    }

    #[test]
    fn test_build_tasks_and_command() {
        let framework = GtestFramework::new(GtestConfig::default());
        let binary = TestBinary::new(
            "./math_test",
            vec![TestIdentifier::new("Math", "Adds"), TestIdentifier::new("Math", "Divides")],
        );
        let forwarded = vec!["--gtest_repeat=2".to_string(), "--name=a b".to_string()];

        let tasks = framework.build_tasks(&binary, &forwarded);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].test.to_string(), "Math.Divides");
        assert_eq!(tasks[1].args, forwarded);

        let cmd = framework.produce_test_execution_command(&tasks[0]);
        assert_eq!(cmd.program, PathBuf::from("./math_test"));
        assert_eq!(
            cmd.args,
            ["--gtest_filter=Math.Adds", "--gtest_repeat=2", "--name=a b"]
        );
        assert_eq!(cmd.timeout, None);
    }

    #[tokio::test]
    async fn test_discover_missing_binary_is_fatal() {
        let framework = GtestFramework::new(GtestConfig::default());
        let err = framework
            .discover(Path::new("/nonexistent/math_test"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::DiscoveryFailed { .. }));
    }
}
