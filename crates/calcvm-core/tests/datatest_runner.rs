//! Fixture-driven integration tests covering the end-to-end REPL scenario
//! table (spec.md §8): each fixture is a sequence of lines fed to a single
//! [`calcvm_core::Session`] in order, mirroring a multi-line REPL session.
//! Grounded in the teacher's own fixture harness
//! (`examples/scostello-monty/crates/monty/tests/datatest_runner.rs`): a
//! `datatest_stable::harness!` macro driving plain-text fixtures, each ending
//! in a single expectation comment on its last line.

use std::error::Error;
use std::fs;
use std::path::Path;

use calcvm_core::config::Config;
use calcvm_core::repl::Session;

#[derive(Debug)]
enum Expectation {
    /// Expect the final line to evaluate successfully with this `Display` text.
    Return(String),
    /// Expect the final line to fail, with the error's `Display` text containing this substring.
    Error(String),
}

/// Splits a fixture into its REPL input lines and its trailing expectation.
/// The expectation MUST be the last non-empty line, written as either
/// `# Return=<value>` or `# Error=<substring>`. Blank lines and other `#`
/// comments are dropped from the REPL input.
fn parse_fixture(content: &str) -> (Vec<String>, Expectation) {
    let mut lines: Vec<&str> = content.lines().collect();
    while matches!(lines.last(), Some(l) if l.trim().is_empty()) {
        lines.pop();
    }
    let last = lines.pop().expect("fixture has a trailing expectation line");
    let expectation = if let Some(expected) = last.strip_prefix("# Return=") {
        Expectation::Return(expected.to_string())
    } else if let Some(expected) = last.strip_prefix("# Error=") {
        Expectation::Error(expected.to_string())
    } else {
        panic!("fixture's last line must be `# Return=...` or `# Error=...`, got: {last}");
    };

    let repl_lines: Vec<String> = lines
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    assert!(!repl_lines.is_empty(), "fixture has no REPL input lines");
    (repl_lines, expectation)
}

fn run_fixture_test(path: &Path) -> Result<(), Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let (lines, expectation) = parse_fixture(&content);
    let test_name = path.display().to_string();

    let mut session = Session::new(Config::default());
    let mut last = None;
    for line in &lines {
        last = Some(session.eval(line));
    }
    let last = last.expect("at least one line was evaluated");

    match expectation {
        Expectation::Return(expected) => match last {
            Ok(value) => assert_eq!(value.to_string(), expected, "[{test_name}] return value mismatch"),
            Err(e) => panic!("[{test_name}] expected a return value, got error: {e}"),
        },
        Expectation::Error(expected) => match last {
            Ok(value) => panic!("[{test_name}] expected an error containing `{expected}`, got return value {value}"),
            Err(e) => {
                let msg = e.to_string();
                assert!(
                    msg.contains(&expected),
                    "[{test_name}] error `{msg}` does not contain `{expected}`"
                );
            }
        },
    }
    Ok(())
}

datatest_stable::harness!(run_fixture_test, "tests/fixtures", r"^.*\.calc$");
