//! The compiler's per-node metadata, kept in a side-table rather than on the node
//! itself (SPEC_FULL.md §3, Design Notes in spec.md §9) so parsed AST nodes stay
//! immutable after parsing. Mirrors spec.md §4.5's "metadata slot on every node is
//! `Instructions | Fragment{main, fn, fn_name} | FnMeta{fragment, closure?}`".

use indexmap::IndexMap;

use crate::bytecode::instr::Instruction;

/// One node's emitted code: inline code destined for wherever the node is used
/// (`main`), plus an optional contribution to the shared function area (`fn_body`,
/// `fn_name`) for `FuncDef` nodes.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub main: Vec<Instruction>,
    pub fn_body: Option<Vec<Instruction>>,
    pub fn_name: Option<String>,
}

impl Fragment {
    #[must_use]
    pub fn inline(main: Vec<Instruction>) -> Self {
        Self {
            main,
            fn_body: None,
            fn_name: None,
        }
    }

    #[must_use]
    pub fn function(main: Vec<Instruction>, name: String, body: Vec<Instruction>) -> Self {
        Self {
            main,
            fn_body: Some(body),
            fn_name: Some(name),
        }
    }
}

/// Dense capture-slot table for a lambda in closure mode: maps
/// `(ancestor_fn_name, param_index)` to a slot id inside the lambda's env table
/// (spec.md §4.1 "Closure capture").
#[derive(Debug, Clone, Default)]
pub struct ClosureCapture {
    slots: IndexMap<(String, usize), usize>,
}

impl ClosureCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dense slot id for `(ancestor_fn, param_index)`, allocating a new
    /// one if this is the first reference to that ancestor parameter.
    pub fn slot_for(&mut self, ancestor_fn: &str, param_index: usize) -> usize {
        let key = (ancestor_fn.to_string(), param_index);
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.insert(key, slot);
        slot
    }

    /// Captured `(ancestor_fn, param_index)` pairs in slot order, used to emit the
    /// `pushparm`/`tmake` sequence when the enclosing function constructs the
    /// closure environment.
    #[must_use]
    pub fn ordered_captures(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<(&(String, usize), &usize)> = self.slots.iter().collect();
        entries.sort_by_key(|(_, slot)| **slot);
        entries.into_iter().map(|(k, _)| k.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Per-`FuncDef` compiler metadata: its emitted fragment plus, if this function is
/// a lambda that captured outer parameters, its closure table.
#[derive(Debug, Clone, Default)]
pub struct FnMeta {
    pub fragment: Fragment,
    pub closure: Option<ClosureCapture>,
}
