//! `Shared`/`Compiled`/`Linked` (spec.md §3, §4.2). Grounded in
//! `examples/original_source/compiler/shared.go` (merge rules) and
//! `compiler/compiled.go` (`Linked()` two-phase emission), re-expressed with the
//! deferred-removal fix spec.md §9 recommends instead of the original's
//! slice-mutating `RemoveFn` (which invalidates later offsets).

use std::collections::HashMap;

use crate::bytecode::instr::{Instruction, Opcode, Operand, UnresolvedKind};
use crate::error::LinkError;
use crate::symbol::{FuncSymbol, SymbolTable, VarSymbol};
use crate::value::Ref;

/// One module's compiled output: its main code plus its contribution to `Shared`.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub main: Vec<Instruction>,
    pub shared: Shared,
}

impl Compiled {
    /// `Compiled.link(other)`: merges `shared` with `other.shared` and replaces
    /// `main` with `other.main` — each REPL line's definitions accumulate while its
    /// top-level expression becomes the new program (spec.md §4.2).
    #[must_use]
    pub fn link(&self, other: &Compiled) -> Compiled {
        let mut merged = self.shared.clone();
        merged.link(&other.shared);
        Compiled {
            main: other.main.clone(),
            shared: merged,
        }
    }

    /// Emits the final executable layout `[main][halt][functions]` and resolves
    /// every `Unresolved` operand into a concrete `Ref` (spec.md §4.2).
    pub fn linked(&self) -> Result<Linked, LinkError> {
        let halt_offset = self.main.len();
        let func_base = halt_offset + 1;

        let mut code = self.main.clone();
        code.push(Instruction::bare(Opcode::Halt));
        code.extend(self.shared.functions.iter().cloned());

        for instr in &mut code {
            resolve_operand(instr, &self.shared, func_base)?;
        }

        let code_map = self.shared.fn_symbols.offset_map(func_base);
        let data_map = self.shared.var_symbols.offset_map(0);
        let highest_data_offset = self.shared.var_symbols.highest_offset();

        Ok(Linked {
            code,
            code_map,
            data_map,
            highest_data_offset,
        })
    }
}

fn resolve_operand(instr: &mut Instruction, shared: &Shared, func_base: usize) -> Result<(), LinkError> {
    if let Operand::Unresolved(unresolved) = &instr.operand {
        let resolved = match unresolved.kind {
            UnresolvedKind::Function => shared
                .fn_symbols
                .get(&unresolved.name)
                .map(|sym| Ref(sym.offset + func_base))
                .ok_or_else(|| LinkError::UnresolvedName(unresolved.name.clone())),
            UnresolvedKind::Variable => shared
                .var_symbols
                .get(&unresolved.name)
                .map(|sym| Ref(sym.offset))
                .ok_or_else(|| LinkError::UnresolvedName(unresolved.name.clone())),
        }?;
        instr.operand = Operand::Ref(resolved);
    }
    Ok(())
}

/// The cumulative image: function bodies, function symbols, variable symbols.
/// Accumulates across REPL lines (spec.md §4.2).
#[derive(Debug, Clone, Default)]
pub struct Shared {
    pub functions: Vec<Instruction>,
    pub fn_symbols: SymbolTable<FuncSymbol>,
    pub var_symbols: SymbolTable<VarSymbol>,
}

impl Shared {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fn(&mut self, name: String, body: &[Instruction], arity: i32) {
        if self.fn_symbols.contains(&name) {
            self.remove_fn(&name);
        }
        let offset = self.functions.len();
        self.functions.extend_from_slice(body);
        self.fn_symbols.insert(
            name,
            FuncSymbol {
                offset,
                size: body.len(),
                arity,
            },
        );
    }

    pub fn add_var(&mut self, name: String) -> VarSymbol {
        self.var_symbols.alloc(name)
    }

    /// Tombstones `name`'s old body instead of slicing it out of `functions`
    /// (spec.md §9: slicing invalidates later offsets). The dead instructions stay
    /// in place; `linked()` never reaches them because no symbol points at them
    /// once the re-append below registers the new offset.
    fn remove_fn(&mut self, name: &str) {
        self.fn_symbols.remove(name);
    }

    /// Merges `other` into `self`: last-wins for functions (the new body is
    /// appended at the end, keeping offsets dense — spec.md §4.2), first-wins for
    /// variables (spec.md §4.4: "redefining their offset would require rewriting
    /// all loads").
    pub fn link(&mut self, other: &Shared) {
        let mut other_functions = other.functions.clone();
        let delta = self.functions.len();

        let mut incoming: HashMap<String, FuncSymbol> = HashMap::new();
        for (name, sym) in other.fn_symbols.iter() {
            incoming.insert(name.clone(), *sym);
        }
        for sym in incoming.values_mut() {
            sym.offset += delta;
        }

        self.functions.append(&mut other_functions);
        for (name, sym) in incoming {
            self.add_fn_resolved(name, sym);
        }

        for (name, _) in other.var_symbols.iter() {
            if !self.var_symbols.contains(name) {
                // `other`'s offset was only meaningful inside its own module; a
                // newly-merged name gets the next free offset in `self`'s table,
                // not the number it happened to hold in `other`.
                self.var_symbols.alloc(name.clone());
            }
        }
    }

    fn add_fn_resolved(&mut self, name: String, sym: FuncSymbol) {
        self.fn_symbols.remove(&name);
        self.fn_symbols.insert(name, sym);
    }
}

/// The flat, executable instruction vector plus offset maps (spec.md §3).
#[derive(Debug, Clone)]
pub struct Linked {
    pub code: Vec<Instruction>,
    pub code_map: indexmap::IndexMap<usize, String>,
    pub data_map: indexmap::IndexMap<usize, String>,
    pub highest_data_offset: i64,
}
