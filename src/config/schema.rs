//! Configuration schema definitions for gtest-fanout.
//!
//! This module defines all configuration types that can be deserialized from
//! TOML configuration files. Every section and field is optional; a missing
//! file behaves exactly like an empty one.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── FanoutConfig   - Run settings (parallelism, timeouts, binaries)
//! └── GtestConfig    - What is forwarded to each Google Test binary
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure for gtest-fanout.
///
/// # TOML Structure
///
/// ```toml
/// [fanout]
/// concurrency = 8
/// test_timeout_secs = 300
/// binaries = ["build/math_test"]
///
/// [gtest]
/// filter = "Math.*"
/// test_args = "--gtest_also_run_disabled_tests"
/// ```
///
/// # Example
///
/// ```
/// use gtest_fanout::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [fanout]
///     concurrency = 2
/// "#).unwrap();
///
/// assert_eq!(config.fanout.concurrency, 2);
/// assert_eq!(config.gtest.filter, "*");
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Core run settings.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Settings forwarded to the test binaries.
    #[serde(default)]
    pub gtest: GtestConfig,
}

/// Core run settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `concurrency` | 1 |
/// | `test_timeout_secs` | None (no timeout) |
/// | `verbose` | false |
/// | `fail_on_failure` | false |
/// | `binaries` | empty |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FanoutConfig {
    /// Maximum number of test processes running at once.
    ///
    /// Clamped to the number of discovered tests, and to at least 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Kill a single test process after this many seconds.
    ///
    /// A killed test is reported as crashed. Without a value a hung test
    /// holds its worker slot for the rest of the run.
    #[serde(default)]
    pub test_timeout_secs: Option<u64>,

    /// Also dump the output of passing tests.
    #[serde(default)]
    pub verbose: bool,

    /// Exit with status 1 when any test failed or crashed.
    ///
    /// By default the run exits 0 once every test has been executed, and the
    /// summary carries the pass/fail counts.
    #[serde(default)]
    pub fail_on_failure: bool,

    /// Test binaries to run. Paths may start with `~`.
    #[serde(default)]
    pub binaries: Vec<PathBuf>,
}

fn default_concurrency() -> usize {
    1
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            test_timeout_secs: None,
            verbose: false,
            fail_on_failure: false,
            binaries: Vec::new(),
        }
    }
}

impl FanoutConfig {
    /// The per-test timeout, if one is configured.
    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout_secs.map(Duration::from_secs)
    }
}

/// Settings forwarded to every Google Test invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GtestConfig {
    /// `--gtest_filter` expression used when listing tests.
    ///
    /// Default: `*`
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Extra arguments appended to every single-test invocation.
    ///
    /// Split with POSIX shell quoting rules, so `--flag="a b"` stays one
    /// argument.
    #[serde(default)]
    pub test_args: String,
}

fn default_filter() -> String {
    "*".to_string()
}

impl Default for GtestConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            test_args: String::new(),
        }
    }
}
