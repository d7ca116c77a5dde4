//! Test reporting and console output.
//!
//! Every byte the run prints to the console goes through one [`SyncWriter`].
//! It holds a single lock for the whole duration of each write, so a
//! multi-line failure dump from one worker can never be split by lines from
//! another worker.
//!
//! [`ConsoleReporter`] decides *what* to print: a bannered dump of the
//! captured output for every failed or crashed test as soon as it finishes,
//! optionally the same for passing tests, and the summary at the end.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use console::style;
use tracing::warn;

use crate::framework::TestBinary;
use crate::outcome::{Outcome, RunSummary, TestResult};

/// Serializes writes to a shared output sink.
///
/// There is no queue: a worker that wants to print while another is
/// printing simply blocks on the lock.
pub struct SyncWriter {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl SyncWriter {
    /// Wraps an arbitrary sink.
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Writer for the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Writes `block` as one uninterrupted unit and flushes it.
    ///
    /// A newline is appended if the block does not end with one.
    pub fn emit(&self, block: &str) -> std::io::Result<()> {
        // The sink holds no invariants a panicking writer could break.
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(block.as_bytes())?;
        if !block.ends_with('\n') {
            sink.write_all(b"\n")?;
        }
        sink.flush()
    }
}

/// Receives events during a run.
pub trait Reporter: Send + Sync {
    /// Called once every binary has been listed, before any test runs.
    fn on_discovery_complete(&self, binaries: &[TestBinary]);

    /// Called by a worker as soon as its test has been classified.
    fn on_test_complete(&self, result: &TestResult);

    /// Called once, after every worker has returned.
    fn on_run_complete(&self, summary: &RunSummary, results: &[TestResult]);
}

/// Reporter that prints bannered dumps and the final summary.
pub struct ConsoleReporter {
    writer: SyncWriter,
    verbose: bool,
}

impl ConsoleReporter {
    /// Creates a reporter writing to standard output.
    ///
    /// With `verbose`, passing tests are dumped too.
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(SyncWriter::stdout(), verbose)
    }

    /// Creates a reporter writing to the given writer.
    pub fn with_writer(writer: SyncWriter, verbose: bool) -> Self {
        Self { writer, verbose }
    }

    fn emit(&self, block: &str) {
        if let Err(e) = self.writer.emit(block) {
            warn!("Failed to write report output: {}", e);
        }
    }
}

impl Reporter for ConsoleReporter {
    fn on_discovery_complete(&self, binaries: &[TestBinary]) {
        let total: usize = binaries.iter().map(|b| b.tests.len()).sum();
        self.emit(&format!(
            "Discovered {} tests in {} binaries",
            total,
            binaries.len()
        ));
    }

    fn on_test_complete(&self, result: &TestResult) {
        if result.outcome.is_success() && !self.verbose {
            return;
        }
        self.emit(&render_dump(result));
    }

    fn on_run_complete(&self, summary: &RunSummary, results: &[TestResult]) {
        self.emit(&render_summary(summary, results));
    }
}

const BANNER_WIDTH: usize = 60;

fn rule(fill: char) -> String {
    format!("|{}|", fill.to_string().repeat(BANNER_WIDTH - 2))
}

fn banner(title: &str) -> String {
    let rule = rule('=');
    format!(
        "{rule}\n|{:^width$}|\n{rule}",
        title,
        width = BANNER_WIDTH - 2
    )
}

/// Renders the dump printed when a test finishes.
///
/// Crashes and assertion failures get visibly different banners. The
/// captured stdout and stderr follow, unmodified apart from marker
/// highlighting.
pub fn render_dump(result: &TestResult) -> String {
    let title = match &result.outcome {
        Outcome::Passed => style(banner(">>> PASSED <<<")).green(),
        Outcome::Failed(_) => style(banner(">>> FAILED TEST CASE -- ASSERTION FAILURE <<<")).red(),
        Outcome::Crashed(_) => {
            style(banner(">>> CRASHED TEST CASE -- LIKELY SEGFAULT <<<")).red().bold()
        }
    };

    let mut out = String::new();
    out.push_str(&format!("{}\n", title));
    out.push_str(&format!(" test:     {}\n", result.label()));
    if let Some(reason) = result.outcome.reason() {
        out.push_str(&format!(" reason:   {}\n", reason));
    }
    out.push_str(&format!(
        " duration: {:.2?}\n",
        result.captured.duration
    ));

    for (name, content) in [
        ("stdout", result.captured.stdout_lossy()),
        ("stderr", result.captured.stderr_lossy()),
    ] {
        out.push_str(&format!(
            "{}\n",
            style(format!("▼▼▼▼▼▼▼▼▼▼ {} ▼▼▼▼▼▼▼▼▼▼", name)).yellow()
        ));
        out.push_str(&colorize(&content));
        if !content.is_empty() && !content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!(
            "{}\n",
            style(format!("▲▲▲▲▲▲▲▲▲▲ {} ▲▲▲▲▲▲▲▲▲▲", name)).yellow()
        ));
    }

    out
}

/// Renders the end-of-run summary.
pub fn render_summary(summary: &RunSummary, results: &[TestResult]) -> String {
    let headline = format!(
        "|>>>We ran {} test cases, passing {} test case(s) and failing {} test case(s)!<<<|",
        summary.total,
        summary.passed,
        summary.failed_or_crashed()
    );
    let rule = format!("|{}|", "=".repeat(headline.chars().count() - 2));
    let headline = headline
        .replacen(
            &format!("passing {} test case(s)", summary.passed),
            &style(format!("passing {} test case(s)", summary.passed))
                .green()
                .to_string(),
            1,
        )
        .replacen(
            &format!("failing {} test case(s)", summary.failed_or_crashed()),
            &style(format!("failing {} test case(s)", summary.failed_or_crashed()))
                .red()
                .to_string(),
            1,
        );

    let mut out = format!("{rule}\n{headline}\n{rule}\n");
    out.push_str(&format!(
        "  Failed: {}  Crashed: {}  Duration: {:.2?}\n",
        summary.failed, summary.crashed, summary.duration
    ));

    let mut failing: Vec<&TestResult> = results
        .iter()
        .filter(|r| !r.outcome.is_success())
        .collect();
    if !failing.is_empty() {
        failing.sort_by(|a, b| (&a.binary, &a.test).cmp(&(&b.binary, &b.test)));
        out.push_str("\nFailing tests:\n");
        for result in failing {
            let kind = match result.outcome {
                Outcome::Crashed(_) => style("CRASHED").red().bold(),
                _ => style("FAILED ").red(),
            };
            out.push_str(&format!("  {} {}\n", kind, result.label()));
        }
    }

    out
}

/// Highlights Google Test lifecycle markers in captured output.
///
/// A no-op when the console has colors disabled.
pub fn colorize(text: &str) -> String {
    if !console::colors_enabled() {
        return text.to_string();
    }
    highlight_markers(text)
}

fn highlight_markers(text: &str) -> String {
    const GREEN: [&str; 5] = [
        "[       OK ]",
        "[ RUN      ]",
        "[  PASSED  ]",
        "[==========]",
        "[----------]",
    ];

    let mut out = text.to_string();
    for marker in GREEN {
        out = out.replace(marker, &style(marker).green().force_styling(true).to_string());
    }
    out.replace(
        "[  FAILED  ]",
        &style("[  FAILED  ]").red().force_styling(true).to_string(),
    )
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::test_support::SharedBuffer;
    use super::*;
    use crate::executor::CapturedResult;
    use crate::framework::TestIdentifier;

    fn result(case: &str, outcome: Outcome, stdout: &str, stderr: &str) -> TestResult {
        TestResult {
            binary: PathBuf::from("./math_test"),
            test: TestIdentifier::new("Math", case),
            outcome,
            captured: CapturedResult::from_output(stdout, stderr),
        }
    }

    #[test]
    fn test_emit_appends_newline() {
        let buffer = SharedBuffer::default();
        let writer = SyncWriter::new(buffer.clone());
        writer.emit("one").unwrap();
        writer.emit("two\n").unwrap();
        assert_eq!(buffer.contents(), "one\ntwo\n");
    }

    #[test]
    fn test_concurrent_blocks_do_not_interleave() {
        const THREADS: usize = 8;
        const BLOCKS: usize = 25;
        const LINES: usize = 12;

        let buffer = SharedBuffer::default();
        let writer = SyncWriter::new(buffer.clone());

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let writer = &writer;
                scope.spawn(move || {
                    for b in 0..BLOCKS {
                        let block: String = (0..LINES)
                            .map(|l| format!("thread {} block {} line {}\n", t, b, l))
                            .collect();
                        writer.emit(&block).unwrap();
                    }
                });
            }
        });

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), THREADS * BLOCKS * LINES);

        for chunk in lines.chunks(LINES) {
            let prefix = chunk[0].rsplit_once(" line ").unwrap().0;
            for (l, line) in chunk.iter().enumerate() {
                assert_eq!(*line, format!("{} line {}", prefix, l));
            }
        }
    }

    #[test]
    fn test_dump_banners_differ_by_outcome() {
        let failed = render_dump(&result(
            "Divides",
            Outcome::Failed("[  FAILED  ] Math.Divides (0 ms)".into()),
            "[ RUN      ] Math.Divides\n",
            "",
        ));
        let crashed = render_dump(&result(
            "Segfaults",
            Outcome::Crashed("terminated".into()),
            "[ RUN      ] Math.Segfaults\n",
            "boom\n",
        ));

        assert!(failed.contains("ASSERTION FAILURE"));
        assert!(!failed.contains("LIKELY SEGFAULT"));
        assert!(crashed.contains("LIKELY SEGFAULT"));
        assert!(!crashed.contains("ASSERTION FAILURE"));
    }

    #[test]
    fn test_dump_contains_output_verbatim() {
        let stdout = "line one\n  indented line two\n";
        let stderr = "warning: something odd";
        let dump = render_dump(&result(
            "Divides",
            Outcome::Failed("no success marker".into()),
            stdout,
            stderr,
        ));

        assert!(dump.contains("./math_test: Math.Divides"));
        assert!(dump.contains("no success marker"));
        assert!(dump.contains(stdout));
        assert!(dump.contains("warning: something odd\n"));

        let stdout_at = dump.find("line one").unwrap();
        let stderr_at = dump.find("warning: something odd").unwrap();
        assert!(stdout_at < stderr_at);
    }

    #[test]
    fn test_reporter_skips_passing_unless_verbose() {
        let passing = result("Adds", Outcome::Passed, "[       OK ] Math.Adds\n", "");

        let quiet_buffer = SharedBuffer::default();
        let quiet = ConsoleReporter::with_writer(SyncWriter::new(quiet_buffer.clone()), false);
        quiet.on_test_complete(&passing);
        assert!(quiet_buffer.contents().is_empty());

        let loud_buffer = SharedBuffer::default();
        let loud = ConsoleReporter::with_writer(SyncWriter::new(loud_buffer.clone()), true);
        loud.on_test_complete(&passing);
        assert!(loud_buffer.contents().contains("PASSED"));
        assert!(loud_buffer.contents().contains("Math.Adds"));
    }

    #[test]
    fn test_highlight_markers_wraps_only_markers() {
        let text = "[ RUN      ] Math.Divides\nmath_test.cc:12: Failure\n[  FAILED  ] Math.Divides (0 ms)\n";
        let highlighted = highlight_markers(text);

        assert!(highlighted.contains("\u{1b}[31m[  FAILED  ]\u{1b}[0m Math.Divides (0 ms)\n"));
        assert!(highlighted.contains("\u{1b}[32m[ RUN      ]\u{1b}[0m Math.Divides\n"));
        assert!(highlighted.contains("\nmath_test.cc:12: Failure\n"));
        assert_eq!(console::strip_ansi_codes(&highlighted), text);
    }

    #[test]
    fn test_highlight_markers_leaves_plain_text() {
        let text = "no markers here [ OK ] [FAILED]\n";
        assert_eq!(highlight_markers(text), text);
    }

    #[test]
    fn test_summary_counts_and_failing_list() {
        let results = vec![
            result("Adds", Outcome::Passed, "", ""),
            result("Divides", Outcome::Failed("x".into()), "", ""),
            result("Segfaults", Outcome::Crashed("y".into()), "", ""),
        ];
        let summary = RunSummary::from_results(&results, Duration::from_millis(1500));
        let text = render_summary(&summary, &results);

        assert!(text.contains("We ran 3 test cases"));
        assert!(text.contains("passing 1 test case(s)"));
        assert!(text.contains("failing 2 test case(s)"));
        assert!(text.contains("Failed: 1  Crashed: 1"));
        assert!(text.contains("Failing tests:"));
        assert!(text.contains("./math_test: Math.Divides"));
        assert!(text.contains("./math_test: Math.Segfaults"));
        assert!(!text.contains("./math_test: Math.Adds"));
    }

    #[test]
    fn test_summary_for_empty_run() {
        let summary = RunSummary::default();
        let text = render_summary(&summary, &[]);
        assert!(text.contains("We ran 0 test cases"));
        assert!(text.contains("passing 0 test case(s)"));
        assert!(!text.contains("Failing tests:"));
    }

    #[test]
    fn test_summary_rule_matches_headline_width() {
        let summary = RunSummary {
            total: 10,
            passed: 10,
            ..Default::default()
        };
        let text = render_summary(&summary, &[]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            console::measure_text_width(lines[0]),
            console::measure_text_width(lines[1])
        );
        assert_eq!(lines[0], lines[2]);
    }
}
