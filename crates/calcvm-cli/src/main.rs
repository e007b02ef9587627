//! Interactive front end for `calcvm-core` (SPEC_FULL.md §4.8). Grounded in
//! `atl-lang-atlas`'s `atlas-cli` for the `clap`/`rustyline` pairing — the only
//! example repo in the reference pack with an interactive REPL dependency —
//! since the teacher itself (`monty-cli`) is a one-shot batch runner with no
//! line-editing story of its own.

use std::path::PathBuf;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use calcvm_core::config::Config;
use calcvm_core::diagnostics;
use calcvm_core::error::CalcError;
use calcvm_core::repl::Session;

/// An interactive arbitrary-precision calculator.
#[derive(Parser, Debug)]
#[command(name = "calcvm", version, about)]
struct Cli {
    /// Evaluate a single expression and exit, instead of starting the REPL.
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Print VM state and a disassembly window after every evaluation.
    #[arg(long)]
    debug: bool,

    /// Override the rustyline history file location.
    #[arg(long)]
    history: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::default();
    config.debug = cli.debug;
    if let Some(history) = cli.history {
        config.history_path = Some(history);
    }

    if let Some(src) = cli.eval {
        let mut session = Session::new(config);
        run_line(&mut session, &src);
        return;
    }

    run_repl(config);
}

fn run_repl(config: Config) {
    let history_path = config.history_path.clone();
    let mut session = Session::new(config);
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("calcvm> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);
                if let Some(name) = trimmed.strip_prefix(":help ") {
                    print_help(&session, name.trim());
                    continue;
                }
                run_line(&mut session, trimmed);
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
}

fn print_help(session: &Session, name: &str) {
    match session.help(name) {
        Some(text) => println!("{name}: {text}"),
        None => println!("no help for `{name}`"),
    }
}

fn run_line(session: &mut Session, src: &str) {
    match session.eval(src) {
        Ok(value) => println!("{value}"),
        Err(err) => {
            print_error(&err);
        }
    }

    if session.config().debug {
        if let Some(linked) = session.last_linked() {
            eprintln!("--- debug ---");
            eprint!("{}", diagnostics::disassemble(linked));
        }
    }
}

fn print_error(err: &CalcError) {
    match err {
        CalcError::Parse(errors) => {
            for e in errors {
                eprintln!("{e}");
            }
        }
        CalcError::Compile(e) => eprintln!("compile error: {e}"),
        CalcError::Link(e) => eprintln!("link error: {e}"),
        CalcError::Runtime(e) => {
            eprintln!("runtime error: {e}");
            eprintln!("{}", e.snapshot);
        }
    }
}
