//! Configuration loading and schema definitions for gtest-fanout.
//!
//! Configuration comes from an optional TOML file. Command-line flags are
//! applied on top of it by the binary.

pub mod schema;

pub use schema::*;

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fanout.toml";

/// Loads gtest-fanout configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads gtest-fanout configuration from a TOML string.
///
/// # Example
///
/// ```
/// use gtest_fanout::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [fanout]
///     concurrency = 4
///
///     [gtest]
///     filter = "Math.*"
/// "#)?;
///
/// assert_eq!(config.fanout.concurrency, 4);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

/// Turns a user-supplied binary path into one that can be executed.
///
/// A leading `~` is expanded. A bare file name is anchored to the working
/// directory so it is not looked up on `PATH`.
///
/// # Example
///
/// ```
/// use std::path::{Path, PathBuf};
/// use gtest_fanout::config::resolve_binary_path;
///
/// assert_eq!(resolve_binary_path(Path::new("math_test")), PathBuf::from("./math_test"));
/// assert_eq!(resolve_binary_path(Path::new("build/math_test")), PathBuf::from("build/math_test"));
/// ```
pub fn resolve_binary_path(path: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());

    let mut components = expanded.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Path::new(".").join(expanded),
        _ => expanded,
    }
}
