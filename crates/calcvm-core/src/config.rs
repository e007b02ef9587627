//! Minimal REPL configuration (SPEC_FULL.md §4.11). Deliberately small: the
//! print-base field leaves room for the out-of-scope "number-base
//! pretty-printing" feature without implementing it, and no compiled state is
//! ever persisted to disk — only `rustyline`'s own history file of past input
//! lines.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Print base for integer results. Only base 10 is required by the
    /// scenario table; other bases are accepted here but not yet rendered
    /// differently anywhere in the crate.
    pub print_base: u32,
    pub debug: bool,
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            print_base: 10,
            debug: false,
            history_path: dirs_history_path(),
        }
    }
}

fn dirs_history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".calcvm_history"))
}
