//! Error taxonomy (spec.md §7). Grounded in the teacher's own style
//! (`monty-python/src/exceptions.rs` hand-maps a closed enum rather than reaching
//! for `thiserror`): every phase gets one hand-written enum with a manual
//! `Display`/`std::error::Error` impl, wrapped at the REPL boundary by `CalcError`.

use std::fmt;

use crate::vm::error::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A single parse failure. `UnboundVariable` is carried here to satisfy the
/// external parser contract (spec.md §6) but this grammar never actually raises
/// it — there is no static binding check at parse time, only at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    Syntax(String),
    UnboundVariable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub inner: ParseErrorKind,
    pub position: SourcePosition,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ParseErrorKind::Syntax(msg) => write!(f, "parse error at {}: {msg}", self.position),
            ParseErrorKind::UnboundVariable(name) => {
                write!(f, "unbound variable `{name}` at {}", self.position)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    UnknownName(String),
    UnknownOperator(String),
    ArityMismatch { name: String, expected: i32, got: usize },
    UnknownBuiltin(String),
    UnknownMetaType(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownName(name) => write!(f, "unknown name `{name}`"),
            Self::UnknownOperator(op) => write!(f, "unknown operator `{op}`"),
            Self::ArityMismatch { name, expected, got } => write!(
                f,
                "`{name}` expects {expected} argument(s), got {got}"
            ),
            Self::UnknownBuiltin(name) => write!(f, "unknown builtin `{name}`"),
            Self::UnknownMetaType(what) => write!(f, "unknown compiler metadata `{what}`"),
        }
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    UnresolvedName(String),
    DanglingOffset(usize),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedName(name) => write!(f, "unresolved name `{name}` at link time"),
            Self::DanglingOffset(offset) => write!(f, "dangling offset {offset} at link time"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Umbrella error for the REPL boundary (SPEC_FULL.md §4.10). No phase produces
/// partial effects on failure: parse/compile/link errors never touch `Shared`,
/// and runtime errors leave the previously-linked `Shared` untouched because
/// compilation of the failing line had already completed before execution began.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcError {
    Parse(Vec<ParseError>),
    Compile(CompileError),
    Link(LinkError),
    Runtime(ExecError),
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
            Self::Compile(e) => write!(f, "compile error: {e}"),
            Self::Link(e) => write!(f, "link error: {e}"),
            Self::Runtime(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for CalcError {}

impl From<CompileError> for CalcError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

impl From<LinkError> for CalcError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ExecError> for CalcError {
    fn from(e: ExecError) -> Self {
        Self::Runtime(e)
    }
}

impl From<Vec<ParseError>> for CalcError {
    fn from(e: Vec<ParseError>) -> Self {
        Self::Parse(e)
    }
}
