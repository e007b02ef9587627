//! Instruction and operand model (spec.md §3, §4.3). Grounded in
//! `bytecode/code.rs`'s `Opcode`/`Instr` split, adapted from a packed-byte
//! instruction stream into a structured `Instruction{opcode, operand}` pair since
//! operands here are never raw bytes (spec.md §3 explicitly calls operands
//! `Value|Unresolved|structured`).

use std::fmt;

use strum::{Display, EnumString};

use crate::value::{Ref, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Opcode {
    Push,
    Pop,
    Swap,
    Clone,
    Iadd,
    Load,
    Store,
    Stores,
    Alloc,
    Free,
    Tmake,
    Tload,
    Tstore,
    Callb,
    Call,
    Calli,
    Calls,
    Return,
    Enter,
    Leave,
    Reparm,
    Vldac,
    Pushparm,
    Copys,
    Mkclsr,
    Setgr,
    Getgr,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedKind {
    Function,
    Variable,
}

impl fmt::Display for UnresolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "fn"),
            Self::Variable => write!(f, "var"),
        }
    }
}

/// Placeholder operand used between compilation and `Compiled::linked()`.
/// spec.md §3: "placeholder used between compilation and final link."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub name: String,
    pub kind: UnresolvedKind,
}

/// `{index, numparms}` for `callb`; `numparms == -1` means "read argc from the stack"
/// (used by builtin shims so one shim serves any arity, spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBOperand {
    pub index: usize,
    pub numparms: i32,
}

/// `{offset, len}` for `copys` — copies a slice near the top of the stack to the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopysOperand {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Value(Value),
    Unresolved(Unresolved),
    Ref(Ref),
    /// Plain integer operand, used by `tmake n`, `tload i`, `tstore i`,
    /// `pushparm i`, `setgr i`, `getgr i`, `vldac n` (`n = -1` disables the check).
    Int(i64),
    CallB(CallBOperand),
    Copys(CopysOperand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    #[must_use]
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    #[must_use]
    pub fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    #[must_use]
    pub fn push(value: Value) -> Self {
        Self::new(Opcode::Push, Operand::Value(value))
    }

    #[must_use]
    pub fn push_unresolved(name: impl Into<String>, kind: UnresolvedKind) -> Self {
        Self::new(
            Opcode::Push,
            Operand::Unresolved(Unresolved {
                name: name.into(),
                kind,
            }),
        )
    }

    #[must_use]
    pub fn load_unresolved(name: impl Into<String>) -> Self {
        Self::new(
            Opcode::Load,
            Operand::Unresolved(Unresolved {
                name: name.into(),
                kind: UnresolvedKind::Variable,
            }),
        )
    }

    #[must_use]
    pub fn store_unresolved(name: impl Into<String>) -> Self {
        Self::new(
            Opcode::Store,
            Operand::Unresolved(Unresolved {
                name: name.into(),
                kind: UnresolvedKind::Variable,
            }),
        )
    }

    #[must_use]
    pub fn call_unresolved(name: impl Into<String>) -> Self {
        Self::new(
            Opcode::Call,
            Operand::Unresolved(Unresolved {
                name: name.into(),
                kind: UnresolvedKind::Function,
            }),
        )
    }

    #[must_use]
    pub fn calli_unresolved(name: impl Into<String>) -> Self {
        Self::new(
            Opcode::Calli,
            Operand::Unresolved(Unresolved {
                name: name.into(),
                kind: UnresolvedKind::Variable,
            }),
        )
    }

    #[must_use]
    pub fn int(opcode: Opcode, n: i64) -> Self {
        Self::new(opcode, Operand::Int(n))
    }

    #[must_use]
    pub fn callb(index: usize, numparms: i32) -> Self {
        Self::new(Opcode::Callb, Operand::CallB(CallBOperand { index, numparms }))
    }
}
