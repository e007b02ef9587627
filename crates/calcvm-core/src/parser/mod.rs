//! PEG parser (SPEC_FULL.md §4.6). Grounded in monty's reliance on an external
//! parser crate adapted into its own node tree (`ruff_python_parser` feeding
//! `prepare.rs`): this module depends on `pest`/`pest_derive` rather than
//! hand-writing a recursive-descent parser, then walks `pest::iterators::Pairs`
//! into this crate's `ast::Node` arena in `ast_builder`.

mod ast_builder;

use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::ast::Ast;
use crate::error::{ParseError, ParseErrorKind, SourcePosition};

#[derive(PestParser)]
#[grammar = "parser/grammar.pest"]
pub(crate) struct CalcGrammar;

/// Parses one REPL line (or a whole script) into an `Ast` whose root (index 0)
/// is always a `Node::Stmts`. `source_name` is carried only for future
/// multi-file diagnostics; the current `SourcePosition` is offset-only within
/// `src`.
pub fn parse(source_name: &str, src: &str) -> Result<Ast, Vec<ParseError>> {
    let _ = source_name;
    let mut pairs = CalcGrammar::parse(Rule::program, src).map_err(|e| vec![pest_to_parse_error(src, e)])?;
    let program = pairs.next().expect("Rule::program always produces exactly one pair");
    ast_builder::build_program(src, program)
}

fn pest_to_parse_error(src: &str, err: pest::error::Error<Rule>) -> ParseError {
    let offset = match &err.location {
        pest::error::InputLocation::Pos(p) => *p,
        pest::error::InputLocation::Span((start, _)) => *start,
    };
    let message = err.to_string();
    ParseError {
        inner: ParseErrorKind::Syntax(message),
        position: offset_to_position(src, offset),
    }
}

/// Converts a byte offset into `{offset, line, col}`, 1-indexed line/col per
/// `SourcePosition`'s `Display` (`"{line}:{col}"`).
pub(crate) fn offset_to_position(src: &str, offset: usize) -> SourcePosition {
    let mut line = 1;
    let mut col = 1;
    for ch in src[..offset.min(src.len())].chars() {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    SourcePosition { offset, line, col }
}
