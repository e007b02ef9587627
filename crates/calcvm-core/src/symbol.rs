//! Symbol tables (spec.md §4.4). Backed by `IndexMap` so that insertion order
//! doubles as dense offset order (invariant 5 of spec.md §3) while retaining
//! O(1) named lookup — grounded in `namespace.rs`'s name→slot map, generalized
//! from a single flat namespace into the function/variable split spec.md requires.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncSymbol {
    pub offset: usize,
    pub size: usize,
    pub arity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarSymbol {
    pub offset: usize,
}

/// Maps names to symbols of a single kind (functions or variables).
///
/// `highest_offset` returns `-1` for an empty table so the first allocation lands
/// at offset 0 (spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct SymbolTable<S> {
    entries: IndexMap<String, S>,
}

impl<S: Copy> SymbolTable<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<S> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: String, symbol: S) {
        self.entries.insert(name, symbol);
    }

    pub fn remove(&mut self, name: &str) -> Option<S> {
        self.entries.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &S)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SymbolTable<VarSymbol> {
    /// `-1` for an empty table per spec.md §4.4.
    #[must_use]
    pub fn highest_offset(&self) -> i64 {
        self.entries
            .values()
            .map(|s| s.offset as i64)
            .max()
            .unwrap_or(-1)
    }

    /// Appends a new variable at `highest_offset + 1`, preserving the dense-from-0
    /// invariant (spec.md §3 invariant 5). A re-`insert` of an existing name keeps
    /// its prior offset (first-wins on link, spec.md §4.2) — callers must check
    /// `contains` first if that's the desired behavior.
    pub fn alloc(&mut self, name: String) -> VarSymbol {
        if let Some(existing) = self.get(&name) {
            return existing;
        }
        let offset = (self.highest_offset() + 1) as usize;
        let sym = VarSymbol { offset };
        self.insert(name, sym);
        sym
    }

    /// Adds `delta` to every entry's offset; used when embedding one `Shared` into
    /// another module's address space.
    pub fn rebase(&mut self, delta: usize) {
        for sym in self.entries.values_mut() {
            sym.offset += delta;
        }
    }

    /// Inverse map from offset to name, for disassembly.
    #[must_use]
    pub fn offset_map(&self, delta: usize) -> IndexMap<usize, String> {
        self.entries
            .iter()
            .map(|(name, sym)| (sym.offset + delta, name.clone()))
            .collect()
    }
}

impl SymbolTable<FuncSymbol> {
    #[must_use]
    pub fn highest_offset(&self) -> i64 {
        self.entries
            .values()
            .map(|s| s.offset as i64)
            .max()
            .unwrap_or(-1)
    }

    pub fn rebase(&mut self, delta: usize) {
        for sym in self.entries.values_mut() {
            sym.offset += delta;
        }
    }

    #[must_use]
    pub fn offset_map(&self, delta: usize) -> IndexMap<usize, String> {
        self.entries
            .iter()
            .map(|(name, sym)| (sym.offset + delta, name.clone()))
            .collect()
    }
}
