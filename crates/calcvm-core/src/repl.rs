//! REPL session state (SPEC_FULL.md §4.8). Grounded in the teacher's
//! `repl.rs::ReplExecutor`: each input line is compiled against the
//! accumulated `name_map`/interns and only the delta is returned — exactly
//! spec.md §4.2's `Compiled`/`Shared`/`link` model, reapplied here on top of
//! this crate's own compiler/linker instead of Python's.

use crate::builtins::Registry;
use crate::bytecode::{Compiled, Compiler, Linked, Shared};
use crate::config::Config;
use crate::error::CalcError;
use crate::value::Value;
use crate::vm::Vm;

/// One REPL's persistent state: the cumulative `Shared` image plus a cache of
/// the last successful link, used by debug/disassembly commands.
pub struct Session {
    builtins: Registry,
    shared: Shared,
    module_id: u64,
    config: Config,
    last_linked: Option<Linked>,
}

impl Session {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            builtins: Registry::standard(),
            shared: Shared::new(),
            module_id: 0,
            config,
            last_linked: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn builtins(&self) -> &Registry {
        &self.builtins
    }

    #[must_use]
    pub fn last_linked(&self) -> Option<&Linked> {
        self.last_linked.as_ref()
    }

    /// Parses, compiles, links, and runs one line. `Shared` is updated as soon
    /// as linking succeeds, independent of whether execution itself errors —
    /// by that point compilation of the line has already completed, so a
    /// runtime failure doesn't roll anything back (spec.md §4.10).
    pub fn eval(&mut self, source: &str) -> Result<Value, CalcError> {
        let module_id = self.module_id;
        self.module_id += 1;

        let mut ast = crate::parser::parse("<repl>", source)?;
        let compiled = Compiler::compile(&mut ast, &self.builtins, Some(&self.shared), module_id)?;

        let base = Compiled {
            main: Vec::new(),
            shared: self.shared.clone(),
        };
        let merged = base.link(&compiled);
        let linked = merged.linked()?;

        self.shared = merged.shared;
        self.last_linked = Some(linked.clone());

        let mut vm = Vm::new(&linked, &self.builtins);
        let value = vm.run()?;
        Ok(value)
    }

    /// Looks up a builtin's one-line help string, for the REPL's `help(name)`
    /// meta-command (SPEC_FULL.md §4.7 — not consulted by the compiler/VM).
    #[must_use]
    pub fn help(&self, name: &str) -> Option<&'static str> {
        let index = self.builtins.lookup(name)?;
        self.builtins.help(index)
    }
}
