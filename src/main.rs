//! gtest-fanout CLI - Parallel one-test-per-process Google Test runner.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gtest_fanout::config::{self, Config, DEFAULT_CONFIG_FILE};
use gtest_fanout::framework::TestBinary;
use gtest_fanout::framework::gtest::GtestFramework;
use gtest_fanout::orchestrator::Orchestrator;
use gtest_fanout::report::ConsoleReporter;

#[derive(Parser)]
#[command(name = "gtest-fanout")]
#[command(about = "Run Google Test binaries one test per process, in parallel", long_about = None)]
#[command(version)]
struct Cli {
    /// Test binaries to run (added to those in the config file)
    binaries: Vec<PathBuf>,

    /// Configuration file path [default: fanout.toml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Google Test filter used when listing tests
    #[arg(short, long, visible_alias = "gtest_filter")]
    filter: Option<String>,

    /// Extra arguments forwarded to every test invocation
    #[arg(short = 'a', long, visible_alias = "gtest_args", allow_hyphen_values = true)]
    test_args: Option<String>,

    /// Maximum number of tests running at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Kill a single test after this many seconds
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print output of passing tests too, and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Exit with status 1 if any test failed or crashed
    #[arg(long)]
    fail_on_failure: bool,

    /// Only discover tests, don't run them
    #[arg(long)]
    collect_only: bool,

    /// Output format for --collect-only
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; the report owns stdout.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = resolve_config(&cli)?;
    if config.fanout.binaries.is_empty() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "no test binaries given on the command line or in the config file",
            )
            .exit();
    }

    let fail_on_failure = config.fanout.fail_on_failure;
    let framework = GtestFramework::new(config.gtest.clone());
    let reporter = ConsoleReporter::new(config.fanout.verbose);
    let orchestrator = Orchestrator::new(config, framework, reporter);

    if cli.collect_only {
        let binaries = orchestrator
            .discover(&orchestrator.binaries())
            .await
            .context("Test discovery failed")?;
        return print_collected(&binaries, cli.format);
    }

    let result = orchestrator.run().await?;
    std::process::exit(result.exit_code(fail_on_failure));
}

/// Loads the config file, if any, and applies command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_from(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_from(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Config::default(),
    };

    config.fanout.binaries.extend(cli.binaries.iter().cloned());

    if let Some(filter) = &cli.filter {
        config.gtest.filter = filter.clone();
    }
    if let Some(args) = &cli.test_args {
        config.gtest.test_args = args.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.fanout.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.fanout.test_timeout_secs = Some(timeout);
    }
    config.fanout.verbose |= cli.verbose;
    config.fanout.fail_on_failure |= cli.fail_on_failure;

    Ok(config)
}

fn load_from(path: &Path) -> Result<Config> {
    let config = config::load_config(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn print_collected(binaries: &[TestBinary], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(binaries)?;
            println!("{}", json);
        }
        Format::Text => {
            let total: usize = binaries.iter().map(|b| b.tests.len()).sum();
            println!("Discovered {} tests:", total);
            for binary in binaries {
                println!("{}:", binary.path.display());
                for test in &binary.tests {
                    println!("  {}", test);
                }
            }
        }
    }

    Ok(())
}
