//! Runtime error taxonomy (spec.md §7, §4.3). Every handler that partially
//! mutates the stack restores it before returning one of these, so
//! `ExecError::snapshot` always reflects pre-instruction state (spec.md §4.3).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    InvalidOperandType(String),
    InvalidOperandValue(String),
    InvalidStackSize(String),
    InvalidAddress(usize),
    InvalidArgumentCount { expected: i32, got: usize },
    InvalidBuiltinIndex(usize),
    InvalidVariableType(String),
    InvalidRegister(usize),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOperandType(msg) => write!(f, "invalid operand type: {msg}"),
            Self::InvalidOperandValue(msg) => write!(f, "invalid operand value: {msg}"),
            Self::InvalidStackSize(msg) => write!(f, "invalid stack size: {msg}"),
            Self::InvalidAddress(addr) => write!(f, "invalid address {addr}"),
            Self::InvalidArgumentCount { expected, got } => {
                write!(f, "invalid argument count: expected {expected}, got {got}")
            }
            Self::InvalidBuiltinIndex(idx) => write!(f, "invalid builtin index {idx}"),
            Self::InvalidVariableType(msg) => write!(f, "invalid variable type: {msg}"),
            Self::InvalidRegister(idx) => write!(f, "invalid register {idx}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// A runtime error plus the VM-state snapshot at the failing instruction
/// (spec.md §4.3, §6 "disassembly/debug surface").
#[derive(Debug, Clone, PartialEq)]
pub struct ExecError {
    pub error: RuntimeError,
    pub ip: usize,
    pub snapshot: String,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at ip={})", self.error, self.ip)
    }
}

impl std::error::Error for ExecError {}
